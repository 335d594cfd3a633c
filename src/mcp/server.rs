//! Query hub MCP server implementation

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_router,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::core::config::HubConfig;
use crate::core::dashboard::Dashboard;
use crate::providers::azure::{advisor_query, AzureRestClient};
use crate::providers::{Analytics, Metrics, OpenAiClient, ResourceGraph};
use crate::search::builder::IndexBuilder;
use crate::search::library::QueryLibrary;
use crate::search::vectordb::QueryIndex;

/// Parameters for the get_query_suggestions tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestParams {
    /// What the caller is trying to find out
    #[schemars(description = "The concern or purpose of the request")]
    pub purpose: String,
    /// Keywords associated with the purpose
    #[schemars(description = "Keywords associated with the purpose")]
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Parameters for the build_query_index tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BuildIndexParams {
    /// Path to the dashboard definition JSON
    #[schemars(description = "Path to the dashboard definition JSON file")]
    pub dashboard_path: String,
}

/// Parameters for the execute_query tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteQueryParams {
    /// KQL query to execute
    #[schemars(description = "KQL query to execute")]
    pub query: String,
}

/// Parameters for the vm_cpu_utilization tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct VmMetricsParams {
    #[schemars(description = "Azure subscription ID")]
    pub subscription_id: String,
    #[schemars(description = "Azure resource group name")]
    pub resource_group: String,
    #[schemars(description = "Name of the virtual machine")]
    pub vm_name: String,
}

/// Parameters for the advisor_recommendations tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AdvisorParams {
    #[schemars(description = "Azure subscription ID")]
    pub subscription_id: String,
    #[schemars(description = "Resource group name, or omit for all groups")]
    #[serde(default)]
    pub resource_group: Option<String>,
    #[schemars(description = "Resource name, or omit for all resources")]
    #[serde(default)]
    pub resource_name: Option<String>,
}

/// Query hub MCP service
#[derive(Clone)]
pub struct HubService {
    config: HubConfig,
    tool_router: ToolRouter<Self>,
}

impl HubService {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn openai(&self) -> Result<Arc<OpenAiClient>, McpError> {
        OpenAiClient::from_config(&self.config)
            .map(Arc::new)
            .map_err(|e| McpError::internal_error(format!("OpenAI client unavailable: {}", e), None))
    }

    fn azure(&self) -> Result<AzureRestClient, McpError> {
        AzureRestClient::from_config(&self.config)
            .map_err(|e| McpError::internal_error(format!("Azure client unavailable: {}", e), None))
    }
}

#[tool_router]
impl HubService {
    /// Suggest indexed dashboard queries for a purpose
    #[tool(
        description = "Makes query suggestions based on a given purpose and keywords. Returns the semantically closest queries from the dashboard query library."
    )]
    async fn get_query_suggestions(
        &self,
        params: Parameters<SuggestParams>,
    ) -> Result<CallToolResult, McpError> {
        let library = QueryLibrary::new(self.openai()?, &self.config);
        let response = library
            .suggest(&params.0.purpose, &params.0.keywords)
            .await;

        let output = serde_json::to_string_pretty(&response).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Rebuild the query index from a dashboard definition
    #[tool(
        description = "Parses a dashboard definition, resolves and summarizes every tile query, and rebuilds the semantic query index. Returns the number of indexed queries."
    )]
    async fn build_query_index(
        &self,
        params: Parameters<BuildIndexParams>,
    ) -> Result<CallToolResult, McpError> {
        let dashboard = Dashboard::load(Path::new(&params.0.dashboard_path))
            .map_err(|e| McpError::invalid_params(format!("Cannot load dashboard: {}", e), None))?;

        let client = self.openai()?;
        let builder = IndexBuilder::new(client.clone(), client, &self.config);
        let entries = builder
            .build_entries(&dashboard)
            .await
            .map_err(|e| McpError::internal_error(format!("Index build failed: {}", e), None))?;

        if let Some(parent) = self.config.index_db.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                McpError::internal_error(format!("Cannot create index directory: {}", e), None)
            })?;
        }

        let mut index = QueryIndex::open(&self.config.index_db, self.config.metric)
            .map_err(|e| McpError::internal_error(format!("Cannot open index: {}", e), None))?;
        let count = index
            .rebuild(&entries)
            .map_err(|e| McpError::internal_error(format!("Index rebuild failed: {}", e), None))?;

        let output = serde_json::json!({ "indexed": count }).to_string();
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Execute an analytical query
    #[tool(description = "Executes a KQL query against the configured cluster database.")]
    async fn execute_query(
        &self,
        params: Parameters<ExecuteQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.0.query.is_empty() {
            return Err(McpError::invalid_params(
                "Query cannot be empty".to_string(),
                None,
            ));
        }

        let table = self
            .azure()?
            .run_query(&params.0.query)
            .await
            .map_err(|e| McpError::internal_error(format!("Failed to execute query: {}", e), None))?;

        let output = serde_json::to_string_pretty(&table).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Fetch VM CPU utilization metrics
    #[tool(description = "Fetches CPU utilization metrics for a virtual machine over the last 30 days.")]
    async fn vm_cpu_utilization(
        &self,
        params: Parameters<VmMetricsParams>,
    ) -> Result<CallToolResult, McpError> {
        let metrics = self
            .azure()?
            .vm_cpu_utilization(
                &params.0.subscription_id,
                &params.0.resource_group,
                &params.0.vm_name,
            )
            .await
            .map_err(|e| {
                McpError::internal_error(
                    format!("Error retrieving data for {}: {}", params.0.vm_name, e),
                    None,
                )
            })?;

        let output = serde_json::to_string_pretty(&metrics).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Retrieve right-size advisor recommendations
    #[tool(
        description = "Retrieves right-size advisor recommendations for a subscription, optionally narrowed to a resource group or a single resource."
    )]
    async fn advisor_recommendations(
        &self,
        params: Parameters<AdvisorParams>,
    ) -> Result<CallToolResult, McpError> {
        let query = advisor_query(
            &params.0.subscription_id,
            params.0.resource_group.as_deref(),
            params.0.resource_name.as_deref(),
        );

        let subscriptions = vec![params.0.subscription_id.clone()];
        let result = self.azure()?.run_graph_query(&subscriptions, &query).await;

        // Shaped like the suggestion response: failures become a payload
        // the caller can inspect instead of a protocol error.
        let output = match result {
            Ok(value) => serde_json::to_string_pretty(&value),
            Err(e) => serde_json::to_string_pretty(&serde_json::json!({ "error": e.to_string() })),
        }
        .map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }
}

impl ServerHandler for HubService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Dashboard query library MCP server. Provides semantic query suggestions, index builds, and analytical query execution.".to_string(),
            ),
            ..Default::default()
        }
    }
}

/// Run the MCP server on stdio
pub async fn run_mcp_server(config: HubConfig) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let service = HubService::new(config);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
