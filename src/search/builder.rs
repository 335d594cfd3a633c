//! Index builder - turns a dashboard definition into indexable entries
//!
//! For every tile: resolve the query, summarize the resolved text, embed
//! `"<title>: <summary>"`. Tiles without a title or with an empty
//! resolution are skipped; a provider failure aborts the whole batch so
//! a partial record set never reaches the store.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::vectordb::QueryEntry;
use crate::core::config::HubConfig;
use crate::core::dashboard::Dashboard;
use crate::core::resolver::resolve;
use crate::error::{HubError, Result};
use crate::providers::{Completions, Embeddings};

pub struct IndexBuilder {
    completions: Arc<dyn Completions>,
    embeddings: Arc<dyn Embeddings>,
    instruction: String,
    max_summary_tokens: u32,
}

impl IndexBuilder {
    pub fn new(
        completions: Arc<dyn Completions>,
        embeddings: Arc<dyn Embeddings>,
        config: &HubConfig,
    ) -> Self {
        Self {
            completions,
            embeddings,
            instruction: config.explainer_instruction.clone(),
            max_summary_tokens: config.max_summary_tokens,
        }
    }

    /// Build one entry per indexable tile, in tile order.
    pub async fn build_entries(&self, dashboard: &Dashboard) -> Result<Vec<QueryEntry>> {
        let query_map = dashboard.query_map();
        let base_queries = dashboard.base_query_map(&query_map);

        let mut entries = Vec::new();

        for tile in &dashboard.tiles {
            let resolved = resolve(tile, &query_map, &base_queries);
            if resolved.title.is_empty() || resolved.full_text.is_empty() {
                continue;
            }

            let description = self
                .completions
                .summarize(
                    &self.instruction,
                    &resolved.full_text,
                    self.max_summary_tokens,
                )
                .await?;

            info!(title = %resolved.title, "summarized query");

            let embedded_text = format!("{}: {}", resolved.title, description);
            let vectors = self.embeddings.embed(&[embedded_text]).await?;
            let vector = vectors.into_iter().next().ok_or_else(|| {
                HubError::Provider("embedding provider returned no vectors".to_string())
            })?;

            entries.push(QueryEntry {
                title: resolved.title,
                description,
                query: resolved.full_text,
                vector,
            });
        }

        Ok(entries)
    }
}

/// Persist entries as the parse-phase cache artifact.
pub fn write_cache(path: &Path, entries: &[QueryEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a previously persisted cache artifact.
pub fn read_cache(path: &Path) -> Result<Vec<QueryEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockCompletions {
        fail_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl MockCompletions {
        fn new() -> Self {
            Self {
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_after(count: usize) -> Self {
            Self {
                fail_after: Some(count),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Completions for MockCompletions {
        async fn summarize(
            &self,
            _instruction: &str,
            content: &str,
            _max_tokens: u32,
        ) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if call >= limit {
                    return Err(HubError::Provider("summarization unavailable".to_string()));
                }
            }
            Ok(format!("summary of [{}]", content))
        }
    }

    struct MockEmbeddings;

    #[async_trait]
    impl Embeddings for MockEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn dashboard() -> Dashboard {
        serde_json::from_str(
            r#"{
                "queries": [
                    {"id": "q1", "text": "Costs | take 5", "usedVariables": []},
                    {"id": "q2", "text": "Usage | count", "usedVariables": []}
                ],
                "tiles": [
                    {"title": "Recent costs", "queryRef": {"queryId": "q1"}},
                    {"title": "", "queryRef": {"queryId": "q2"}},
                    {"title": "Dangling", "queryRef": {"queryId": "missing"}},
                    {"title": "Usage count", "queryRef": {"queryId": "q2"}}
                ]
            }"#,
        )
        .unwrap()
    }

    fn builder(completions: MockCompletions) -> IndexBuilder {
        IndexBuilder::new(
            Arc::new(completions),
            Arc::new(MockEmbeddings),
            &HubConfig::default(),
        )
    }

    #[tokio::test]
    async fn builds_one_entry_per_indexable_tile() {
        let entries = builder(MockCompletions::new())
            .build_entries(&dashboard())
            .await
            .unwrap();

        // Untitled and unresolvable tiles are skipped silently.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Recent costs");
        assert_eq!(entries[0].query, "Costs | take 5");
        assert_eq!(entries[0].description, "summary of [Costs | take 5]");
        assert_eq!(entries[1].title, "Usage count");
    }

    #[tokio::test]
    async fn embeds_title_and_summary_together() {
        let entries = builder(MockCompletions::new())
            .build_entries(&dashboard())
            .await
            .unwrap();

        let expected = format!("{}: {}", entries[0].title, entries[0].description);
        assert_eq!(entries[0].vector, vec![expected.len() as f32, 1.0]);
    }

    #[tokio::test]
    async fn provider_failure_aborts_the_batch() {
        let result = builder(MockCompletions::failing_after(1))
            .build_entries(&dashboard())
            .await;

        assert!(matches!(result, Err(HubError::Provider(_))));
    }

    #[tokio::test]
    async fn cache_roundtrips() {
        let entries = builder(MockCompletions::new())
            .build_entries(&dashboard())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/queries.json");

        write_cache(&path, &entries).unwrap();
        let loaded = read_cache(&path).unwrap();

        assert_eq!(loaded.len(), entries.len());
        assert_eq!(loaded[0].title, entries[0].title);
        assert_eq!(loaded[0].vector, entries[0].vector);
    }
}
