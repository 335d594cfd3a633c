//! Query library retrieval
//!
//! Embeds a natural-language purpose and returns the nearest indexed
//! queries. Always answers with a well-formed response object; provider
//! and store failures are logged and shaped into the `error` field.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::vectordb::{DistanceMetric, QueryIndex};
use crate::core::config::HubConfig;
use crate::error::{HubError, Result};
use crate::providers::Embeddings;

pub const INDEX_NOT_POPULATED: &str = "index not populated";

/// One suggested query; `id` is store-assigned and opaque to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestedQuery {
    pub id: String,
    pub title: String,
    pub description: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QuerySuggestionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub queries: Vec<SuggestedQuery>,
}

pub struct QueryLibrary {
    embeddings: Arc<dyn Embeddings>,
    index_db: PathBuf,
    metric: DistanceMetric,
    limit: usize,
}

impl QueryLibrary {
    pub fn new(embeddings: Arc<dyn Embeddings>, config: &HubConfig) -> Self {
        Self {
            embeddings,
            index_db: config.index_db.clone(),
            metric: config.metric,
            limit: config.suggestion_limit,
        }
    }

    /// Suggest indexed queries matching `purpose`.
    ///
    /// `keywords` accompany the purpose in the request log; ranking is
    /// purely vector-based.
    pub async fn suggest(&self, purpose: &str, keywords: &[String]) -> QuerySuggestionResponse {
        info!(
            purpose,
            keywords = keywords.join(", "),
            "searching for matching queries"
        );

        self.lookup(purpose).await.unwrap_or_else(|e| {
            error!(error = %e, "query suggestion lookup failed");
            QuerySuggestionResponse {
                error: Some(e.to_string()),
                queries: Vec::new(),
            }
        })
    }

    async fn lookup(&self, purpose: &str) -> Result<QuerySuggestionResponse> {
        let index = QueryIndex::open(&self.index_db, self.metric)?;

        // Answer before spending an embedding call on an absent index.
        if !index.exists()? {
            return Ok(QuerySuggestionResponse {
                error: Some(INDEX_NOT_POPULATED.to_string()),
                queries: Vec::new(),
            });
        }

        let vectors = self.embeddings.embed(&[purpose.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            HubError::Provider("embedding provider returned no vectors".to_string())
        })?;

        let neighbors = index.nearest(&vector, self.limit)?;

        let queries = neighbors
            .into_iter()
            .map(|(record, distance)| {
                info!(title = %record.title, distance, "found query candidate");
                SuggestedQuery {
                    id: record.id.to_string(),
                    title: record.title,
                    description: record.description,
                    query: record.query,
                }
            })
            .collect();

        Ok(QuerySuggestionResponse {
            error: None,
            queries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::vectordb::QueryEntry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbeddings {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Embeddings for CountingEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HubError::Provider("embedding unavailable".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn entry(title: &str, vector: Vec<f32>) -> QueryEntry {
        QueryEntry {
            title: title.to_string(),
            description: format!("{} description", title),
            query: format!("{} | take 1", title),
            vector,
        }
    }

    fn library_at(
        dir: &tempfile::TempDir,
        fail: bool,
    ) -> (QueryLibrary, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = HubConfig {
            index_db: dir.path().join("index.db"),
            ..HubConfig::default()
        };
        let library = QueryLibrary::new(
            Arc::new(CountingEmbeddings {
                calls: calls.clone(),
                fail,
            }),
            &config,
        );
        (library, calls)
    }

    #[tokio::test]
    async fn unpopulated_index_short_circuits_without_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let (library, calls) = library_at(&dir, false);

        let response = library.suggest("cost breakdown", &[]).await;

        assert_eq!(response.error.as_deref(), Some(INDEX_NOT_POPULATED));
        assert!(response.queries.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn returns_nearest_queries_in_distance_order() {
        let dir = tempfile::tempdir().unwrap();
        let (library, calls) = library_at(&dir, false);

        let mut index =
            QueryIndex::open(&dir.path().join("index.db"), DistanceMetric::Cosine).unwrap();
        index
            .rebuild(&[
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.0]),
                entry("mid", vec![1.0, 1.0]),
                entry("farther", vec![-1.0, 0.5]),
            ])
            .unwrap();

        let response = library
            .suggest("cost breakdown", &["cost".to_string()])
            .await;

        assert!(response.error.is_none());
        let titles: Vec<&str> = response.queries.iter().map(|q| q.title.as_str()).collect();
        // Default limit is 3 of the 4 records.
        assert_eq!(titles, vec!["near", "mid", "far"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!response.queries[0].id.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_shaped_into_the_response() {
        let dir = tempfile::tempdir().unwrap();
        let (library, _) = library_at(&dir, true);

        let mut index =
            QueryIndex::open(&dir.path().join("index.db"), DistanceMetric::Cosine).unwrap();
        index.rebuild(&[entry("only", vec![1.0, 0.0])]).unwrap();

        let response = library.suggest("anything", &[]).await;

        assert!(response
            .error
            .as_deref()
            .unwrap()
            .contains("embedding unavailable"));
        assert!(response.queries.is_empty());
    }
}
