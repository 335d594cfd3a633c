//! Process configuration
//!
//! Assembled once in `main` from the environment and passed into each
//! component's constructor. Nothing in the crate reads the environment
//! after startup.

use std::path::PathBuf;

use crate::error::{HubError, Result};
use crate::search::vectordb::DistanceMetric;

/// Instruction handed to the summarization provider together with each
/// resolved query. Can be replaced wholesale via
/// `QUERYHUB_EXPLAINER_PROMPT`.
pub const EXPLAINER_INSTRUCTION: &str = "\
You are a FinOps analytics assistant. Explain what the following KQL \
query computes: which data it reads, the filters and aggregations it \
applies, and what the result shows. Answer in two or three plain \
sentences and do not restate the query.";

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Azure OpenAI endpoint, e.g. `https://myaccount.openai.azure.com`.
    pub openai_endpoint: Option<String>,
    pub embedding_deployment: Option<String>,
    pub chat_deployment: Option<String>,
    /// API key; when absent the client sends the bearer token instead.
    pub openai_api_key: Option<String>,

    /// ADX cluster URL for query execution.
    pub cluster_url: Option<String>,
    pub cluster_database: String,
    /// Bearer token for Azure REST calls.
    pub access_token: Option<String>,

    /// Output cap for each query summary.
    pub max_summary_tokens: u32,
    /// How many suggestions a retrieval returns.
    pub suggestion_limit: usize,
    pub metric: DistanceMetric,
    pub index_db: PathBuf,
    pub explainer_instruction: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            openai_endpoint: None,
            embedding_deployment: None,
            chat_deployment: None,
            openai_api_key: None,
            cluster_url: None,
            cluster_database: "Hub".to_string(),
            access_token: None,
            max_summary_tokens: 300,
            suggestion_limit: 3,
            metric: DistanceMetric::Cosine,
            index_db: PathBuf::from("data/query_index.db"),
            explainer_instruction: EXPLAINER_INSTRUCTION.to_string(),
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.openai_endpoint = std::env::var("AZURE_OPENAI_ENDPOINT").ok();
        config.embedding_deployment =
            std::env::var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME").ok();
        config.chat_deployment = std::env::var("AZURE_OPENAI_CHAT_DEPLOYMENT_NAME").ok();
        config.openai_api_key = std::env::var("AZURE_OPENAI_API_KEY").ok();
        config.cluster_url = std::env::var("FINOPS_HUB_CLUSTER").ok();
        config.access_token = std::env::var("AZURE_ACCESS_TOKEN").ok();

        if let Ok(database) = std::env::var("FINOPS_HUB_DATABASE") {
            config.cluster_database = database;
        }
        if let Ok(path) = std::env::var("QUERYHUB_INDEX_DB") {
            config.index_db = PathBuf::from(path);
        }

        config.max_summary_tokens =
            parse_var("QUERYHUB_MAX_SUMMARY_TOKENS", config.max_summary_tokens)?;
        config.suggestion_limit =
            parse_var("QUERYHUB_SUGGESTION_LIMIT", config.suggestion_limit)?;

        if let Ok(metric) = std::env::var("QUERYHUB_DISTANCE_METRIC") {
            config.metric = metric.parse()?;
        }

        if let Ok(path) = std::env::var("QUERYHUB_EXPLAINER_PROMPT") {
            config.explainer_instruction = std::fs::read_to_string(&path).map_err(|e| {
                HubError::Config(format!("cannot read explainer prompt {}: {}", path, e))
            })?;
        }

        Ok(config)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| HubError::Config(format!("{} is not a valid number: {}", name, value))),
        Err(_) => Ok(default),
    }
}
