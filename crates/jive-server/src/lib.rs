//! MCP server layer for MCP Jive.
//!
//! JSON-RPC 2.0 over stdio (newline-delimited), the consolidated tool
//! surface, and the dispatch pipeline: legacy alias rewrite → schema
//! validation → admission control → handler with deadline and cancellation
//! → response envelope → response shaper.

pub mod envelope;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod shaper;
pub mod tools;

pub use registry::{DispatchOutcome, ToolRegistry};
pub use server::{McpServer, ServerConfig};
