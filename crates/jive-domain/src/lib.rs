//! Domain layer for MCP Jive.
//!
//! Core business types and contracts for the agile-workflow engine:
//!
//! - [`entities`] — work items, memory items, execution records
//! - [`value_objects`] — typed identifiers, embeddings, search/filter types
//! - [`ports`] — traits implemented by the provider and infrastructure layers
//! - [`error`] — the domain error type and its tool-surface error codes
//!
//! This crate is pure: no I/O, no runtime, no provider code. Everything here
//! is either data or a contract.

pub mod entities;
pub mod error;
pub mod ports;
pub mod utils;
pub mod value_objects;

pub use error::{Error, Result};
