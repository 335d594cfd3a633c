//! MCP server for the dashboard query library
//!
//! Exposes query suggestions, index builds and the analytical
//! collaborator tools to MCP clients.

mod server;

pub use server::run_mcp_server;
