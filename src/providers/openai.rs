//! Azure OpenAI client
//!
//! One reqwest client serving both capability traits: embeddings and
//! chat-completion summaries. Authentication is either an `api-key`
//! header or a caller-supplied bearer token; the client never acquires
//! credentials itself.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Completions, Embeddings};
use crate::core::config::HubConfig;
use crate::error::{HubError, Result};

const EMBEDDINGS_API_VERSION: &str = "2024-07-01-preview";
const COMPLETIONS_API_VERSION: &str = "2024-12-01-preview";

enum Auth {
    ApiKey(String),
    Bearer(String),
}

pub struct OpenAiClient {
    endpoint: String,
    embedding_deployment: String,
    chat_deployment: String,
    auth: Auth,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let endpoint = require(&config.openai_endpoint, "AZURE_OPENAI_ENDPOINT")?;
        let embedding_deployment = require(
            &config.embedding_deployment,
            "AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME",
        )?;
        let chat_deployment =
            require(&config.chat_deployment, "AZURE_OPENAI_CHAT_DEPLOYMENT_NAME")?;

        let auth = if let Some(key) = &config.openai_api_key {
            Auth::ApiKey(key.clone())
        } else if let Some(token) = &config.access_token {
            Auth::Bearer(token.clone())
        } else {
            return Err(HubError::Config(
                "AZURE_OPENAI_API_KEY or AZURE_ACCESS_TOKEN must be set".to_string(),
            ));
        };

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            embedding_deployment,
            chat_deployment,
            auth,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::ApiKey(key) => request.header("api-key", key),
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
        }
    }
}

fn require(value: &Option<String>, name: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| HubError::Config(format!("{} is not set", name)))
}

#[async_trait]
impl Embeddings for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.endpoint, self.embedding_deployment, EMBEDDINGS_API_VERSION
        );

        debug!(count = texts.len(), "requesting embeddings");

        let response = self
            .authorize(self.client.post(&url))
            .json(&serde_json::json!({ "input": texts }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Provider(format!(
                "embeddings returned {}: {}",
                status, text
            )));
        }

        let result: EmbeddingResponse = response.json().await?;
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Completions for OpenAiClient {
    async fn summarize(
        &self,
        instruction: &str,
        content: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.chat_deployment, COMPLETIONS_API_VERSION
        );

        let body = serde_json::json!({
            "messages": [
                { "role": "system", "content": instruction },
                { "role": "user", "content": content },
            ],
            "max_completion_tokens": max_tokens,
        });

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(HubError::Provider(format!(
                "completions returned {}: {}",
                status, text
            )));
        }

        let json: serde_json::Value = response.json().await?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or(HubError::EmptyCompletion)
    }
}
