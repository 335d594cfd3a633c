//! Query dependency resolver
//!
//! Expands a tile's query into self-contained text by prepending a
//! `let <variable> = <base query>;` binding for every base query the
//! query transitively references. Expansion is a work-list traversal
//! over the variable graph: a LIFO stack of pending variables plus a set
//! of already-bound names, so a dependency cycle degrades to each
//! participant being expanded exactly once instead of looping.

use std::collections::{HashMap, HashSet};

use crate::core::dashboard::{QueryDef, Tile};

/// A tile's query with all transitive base queries inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub title: String,
    pub full_text: String,
}

/// Expand `tile`'s query against the dashboard's query and base query
/// maps.
///
/// A tile without a query reference, or referencing an unknown query id,
/// resolves to empty text; callers skip such tiles downstream. A
/// variable with no resolvable base query contributes no binding line.
///
/// Later-discovered dependencies are prepended later and therefore
/// appear textually earlier, so every binding precedes its first use
/// when read top to bottom.
pub fn resolve(
    tile: &Tile,
    query_map: &HashMap<String, QueryDef>,
    base_queries: &HashMap<String, QueryDef>,
) -> ResolvedQuery {
    let query = tile
        .query_ref
        .as_ref()
        .and_then(|r| r.query_id.as_deref())
        .and_then(|id| query_map.get(id));

    let mut full_text = query.map(|q| q.text.clone()).unwrap_or_default();

    let mut stack: Vec<String> = query.map(|q| q.used_variables.clone()).unwrap_or_default();
    let mut bound: HashSet<String> = HashSet::new();

    while let Some(variable) = stack.pop() {
        if bound.contains(&variable) {
            continue;
        }
        let base = match base_queries.get(&variable) {
            Some(base) if !base.text.is_empty() => base,
            _ => continue,
        };

        full_text = format!("let {} = {};\n{}", variable, base.text, full_text);
        bound.insert(variable);

        for used in &base.used_variables {
            if !stack.iter().any(|pending| pending == used) {
                stack.push(used.clone());
            }
        }
    }

    ResolvedQuery {
        title: tile.title.clone(),
        full_text,
    }
}
