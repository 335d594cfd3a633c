//! queryhub-mcp library
//!
//! Dashboard query extraction, dependency resolution and semantic
//! retrieval.
//!
//! # Modules
//!
//! - `core`: dashboard model, query dependency resolver, configuration
//! - `providers`: capability traits + HTTP clients (embeddings,
//!   completions, analytical execution)
//! - `search`: vector index, index builder, query library retrieval

pub mod core;
pub mod error;
pub mod providers;
pub mod search;

// Re-exports for convenience
pub use crate::core::config::HubConfig;
pub use crate::core::dashboard::{Dashboard, QueryDef, Tile};
pub use crate::core::resolver::{resolve, ResolvedQuery};
pub use crate::error::{HubError, Result};
pub use crate::providers::{Completions, Embeddings};
pub use crate::search::{QueryEntry, QueryIndex, QueryLibrary, SuggestedQuery};
