//! Infrastructure layer for MCP Jive.
//!
//! Constructs and wires the process-wide pieces: configuration, logging,
//! and the application context holding every service. All wiring is
//! explicit construction at startup; services are injectable for tests.

pub mod bootstrap;
pub mod config;
pub mod logging;

pub use bootstrap::AppContext;
pub use config::AppConfig;
