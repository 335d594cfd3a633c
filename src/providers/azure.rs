//! Azure data-plane and management REST adapters
//!
//! Thin clients behind the [`Analytics`], [`Metrics`] and
//! [`ResourceGraph`] capability traits. All calls authenticate with a
//! bearer token supplied through configuration.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{Analytics, Metrics, QueryTable, ResourceGraph};
use crate::core::config::HubConfig;
use crate::error::{HubError, Result};

const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const METRICS_API_VERSION: &str = "2023-10-01";
const RESOURCE_GRAPH_API_VERSION: &str = "2022-10-01";

pub struct AzureRestClient {
    token: String,
    cluster_url: Option<String>,
    database: String,
    client: reqwest::Client,
}

impl AzureRestClient {
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let token = config
            .access_token
            .clone()
            .ok_or_else(|| HubError::Config("AZURE_ACCESS_TOKEN is not set".to_string()))?;

        Ok(Self {
            token,
            cluster_url: config
                .cluster_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            database: config.cluster_database.clone(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        })
    }

    async fn post_json(&self, url: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Provider(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Analytics for AzureRestClient {
    async fn run_query(&self, query: &str) -> Result<QueryTable> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct QueryResponse {
            tables: Vec<Table>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Table {
            columns: Vec<Column>,
            rows: Vec<Vec<serde_json::Value>>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Column {
            column_name: String,
        }

        let cluster = self
            .cluster_url
            .as_ref()
            .ok_or_else(|| HubError::Config("FINOPS_HUB_CLUSTER is not set".to_string()))?;

        info!(database = %self.database, "executing analytical query");

        let body = serde_json::json!({ "db": self.database, "csl": query });
        let json = self
            .post_json(&format!("{}/v1/rest/query", cluster), body)
            .await?;

        let response: QueryResponse = serde_json::from_value(json)?;
        let primary = response
            .tables
            .into_iter()
            .next()
            .ok_or_else(|| HubError::Provider("query returned no tables".to_string()))?;

        Ok(QueryTable {
            columns: primary
                .columns
                .into_iter()
                .map(|c| c.column_name)
                .collect(),
            rows: primary.rows,
        })
    }
}

#[async_trait]
impl Metrics for AzureRestClient {
    async fn vm_cpu_utilization(
        &self,
        subscription_id: &str,
        resource_group: &str,
        vm_name: &str,
    ) -> Result<serde_json::Value> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}/providers/Microsoft.Insights/metrics?api-version={}",
            MANAGEMENT_ENDPOINT, subscription_id, resource_group, vm_name, METRICS_API_VERSION
        );

        info!(vm = %vm_name, "fetching CPU utilization metrics");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .query(&[
                ("timespan", "P30D"),
                ("interval", "PT1H"),
                ("metricnames", "Percentage CPU"),
                ("aggregation", "Maximum"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Provider(format!(
                "metrics returned {}: {}",
                status, text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ResourceGraph for AzureRestClient {
    async fn run_graph_query(
        &self,
        subscriptions: &[String],
        query: &str,
    ) -> Result<serde_json::Value> {
        info!(query = %query, "executing resource graph query");

        let url = format!(
            "{}/providers/Microsoft.ResourceGraph/resources?api-version={}",
            MANAGEMENT_ENDPOINT, RESOURCE_GRAPH_API_VERSION
        );

        self.post_json(
            &url,
            serde_json::json!({ "subscriptions": subscriptions, "query": query }),
        )
        .await
    }
}

/// Builds the resource-graph query for right-size advisor
/// recommendations, optionally narrowed to a resource group or a single
/// resource.
pub fn advisor_query(
    subscription_id: &str,
    resource_group: Option<&str>,
    resource_name: Option<&str>,
) -> String {
    let mut query = format!(
        "advisorresources \
         | where subscriptionId == '{}' \
         | where type == 'microsoft.advisor/recommendations' \
         | where properties contains_cs 'Right-size'",
        subscription_id
    );

    if let Some(group) = resource_group {
        query.push_str(&format!(" | where resourceGroup == '{}'", group));
    }

    if let Some(name) = resource_name {
        query.push_str(&format!(
            " | extend resourceName = split(id, '/')[8] | where resourceName == '{}'",
            name
        ));
    }

    query
}
