//! Semantic query index and retrieval
//!
//! - `vectordb`: SQLite-backed vector store with atomic full rebuilds
//! - `builder`: dashboard -> indexable entries (summarize + embed)
//! - `library`: purpose -> nearest indexed queries

pub mod builder;
pub mod library;
pub mod vectordb;

pub use builder::IndexBuilder;
pub use library::{QueryLibrary, QuerySuggestionResponse, SuggestedQuery};
pub use vectordb::{DistanceMetric, QueryEntry, QueryIndex, QueryRecord};
