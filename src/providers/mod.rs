//! Capability interfaces for external collaborators
//!
//! The core depends on these traits, never on a concrete SDK. Concrete
//! clients live in [`openai`] (embeddings, completions) and [`azure`]
//! (query execution, metrics, resource graph).

pub mod azure;
pub mod openai;

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to numeric vectors, one vector per input string, same order.
#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces a natural-language summary for a piece of content under a
/// fixed instruction, bounded to `max_tokens` of output.
#[async_trait]
pub trait Completions: Send + Sync {
    async fn summarize(&self, instruction: &str, content: &str, max_tokens: u32)
        -> Result<String>;
}

/// Executes an analytical query against a cluster database.
#[async_trait]
pub trait Analytics: Send + Sync {
    async fn run_query(&self, query: &str) -> Result<QueryTable>;
}

/// Fetches time-series metrics for a virtual machine.
#[async_trait]
pub trait Metrics: Send + Sync {
    async fn vm_cpu_utilization(
        &self,
        subscription_id: &str,
        resource_group: &str,
        vm_name: &str,
    ) -> Result<serde_json::Value>;
}

/// Runs a resource-graph query across subscriptions.
#[async_trait]
pub trait ResourceGraph: Send + Sync {
    async fn run_graph_query(
        &self,
        subscriptions: &[String],
        query: &str,
    ) -> Result<serde_json::Value>;
}

/// Tabular query result: column names plus rows of JSON values.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

pub use openai::OpenAiClient;
