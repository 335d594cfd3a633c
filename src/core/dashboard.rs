//! Dashboard definition model
//!
//! A dashboard document carries three arrays: `queries` (the raw query
//! texts), `baseQueries` (variable name -> query bindings), and `tiles`
//! (visuals referencing one query each).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

/// A raw query as it appears in the dashboard `queries` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuery {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub used_variables: Vec<String>,
}

/// A `baseQueries` entry binding a variable name to a query id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseQueryDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub query_id: String,
    #[serde(default)]
    pub variable_name: String,
}

/// A dashboard tile referencing a query by id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub query_ref: Option<QueryRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRef {
    #[serde(default)]
    pub query_id: Option<String>,
}

/// Query text plus the variables it references.
///
/// Used both for entries of the query map (keyed by query id) and for
/// resolved base queries (keyed by variable name).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDef {
    pub text: String,
    pub used_variables: Vec<String>,
}

/// A parsed dashboard definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(default)]
    pub queries: Vec<RawQuery>,
    #[serde(default)]
    pub base_queries: Vec<BaseQueryDef>,
    #[serde(default)]
    pub tiles: Vec<Tile>,
}

impl Dashboard {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build the query id -> query body map.
    ///
    /// Entries without an id or without text are dropped.
    pub fn query_map(&self) -> HashMap<String, QueryDef> {
        let mut map = HashMap::new();
        for query in &self.queries {
            if query.id.is_empty() || query.text.is_empty() {
                continue;
            }
            map.insert(
                query.id.clone(),
                QueryDef {
                    text: query.text.clone(),
                    used_variables: query.used_variables.clone(),
                },
            );
        }
        map
    }

    /// Build the variable name -> base query body map.
    ///
    /// A binding whose query id is unknown resolves to an empty body, so
    /// the resolver treats the variable as unresolvable. Duplicate
    /// variable names keep the last entry; a collision with differing
    /// bodies is logged as an upstream data-quality problem.
    pub fn base_query_map(
        &self,
        query_map: &HashMap<String, QueryDef>,
    ) -> HashMap<String, QueryDef> {
        let mut map: HashMap<String, QueryDef> = HashMap::new();
        for binding in &self.base_queries {
            let body = query_map
                .get(&binding.query_id)
                .cloned()
                .unwrap_or_default();
            if let Some(previous) = map.insert(binding.variable_name.clone(), body.clone()) {
                if previous != body {
                    warn!(
                        variable = %binding.variable_name,
                        "duplicate base query binding, keeping the later definition"
                    );
                }
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dashboard {
        serde_json::from_str(
            r#"{
                "queries": [
                    {"id": "q1", "text": "Costs | summarize sum(Cost)", "usedVariables": ["Scope"]},
                    {"id": "q2", "text": "resources | count", "usedVariables": []},
                    {"id": "", "text": "dropped"},
                    {"id": "q3", "text": ""}
                ],
                "baseQueries": [
                    {"id": "b1", "queryId": "q2", "variableName": "Scope"},
                    {"id": "b2", "queryId": "missing", "variableName": "Orphan"}
                ],
                "tiles": [
                    {"title": "Total cost", "queryRef": {"queryId": "q1"}},
                    {"title": "No query"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn query_map_drops_incomplete_entries() {
        let map = sample().query_map();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("q1"));
        assert!(map.contains_key("q2"));
    }

    #[test]
    fn base_query_map_resolves_through_query_map() {
        let dashboard = sample();
        let queries = dashboard.query_map();
        let bases = dashboard.base_query_map(&queries);

        assert_eq!(bases["Scope"].text, "resources | count");
        // Unknown query id degrades to an empty, unresolvable body.
        assert_eq!(bases["Orphan"].text, "");
    }

    #[test]
    fn duplicate_variable_name_keeps_last() {
        let dashboard: Dashboard = serde_json::from_str(
            r#"{
                "queries": [
                    {"id": "q1", "text": "first"},
                    {"id": "q2", "text": "second"}
                ],
                "baseQueries": [
                    {"id": "b1", "queryId": "q1", "variableName": "V"},
                    {"id": "b2", "queryId": "q2", "variableName": "V"}
                ]
            }"#,
        )
        .unwrap();

        let queries = dashboard.query_map();
        let bases = dashboard.base_query_map(&queries);
        assert_eq!(bases["V"].text, "second");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let dashboard: Dashboard = serde_json::from_str("{}").unwrap();
        assert!(dashboard.queries.is_empty());
        assert!(dashboard.base_queries.is_empty());
        assert!(dashboard.tiles.is_empty());
    }
}
