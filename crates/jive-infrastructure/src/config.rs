//! Application configuration
//!
//! Layered figment profile: defaults, then an optional `jive.toml`, then
//! `MCP_JIVE_`-prefixed environment variables (highest priority).

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use jive_domain::error::{Error, Result};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "MCP_JIVE_";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Data directory for the document store (`None` = in-memory)
    pub data_dir: Option<PathBuf>,
    /// Directory for markdown exports
    pub exports_dir: PathBuf,
    /// Tool surface mode: `consolidated` or `full` (legacy names exposed)
    pub tool_mode: String,
    /// Accept legacy tool names
    pub legacy_support: bool,
    /// Emit deprecation notes when legacy names are used
    pub deprecation_warnings: bool,
    /// Per-call deadline in seconds
    pub tool_timeout_secs: u64,
    /// Maximum in-flight tool calls
    pub max_in_flight: usize,
    /// Maximum queued tool calls beyond the in-flight cap
    pub max_queued: usize,
    /// Response shaper byte budget
    pub max_response_bytes: usize,
    /// Log level filter (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: Some(PathBuf::from("data/jive")),
            exports_dir: PathBuf::from("exports"),
            tool_mode: "consolidated".to_owned(),
            legacy_support: true,
            deprecation_warnings: true,
            tool_timeout_secs: 30,
            max_in_flight: 64,
            max_queued: 256,
            max_response_bytes: 50_000,
            log_level: "info".to_owned(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `jive.toml` (if present) and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on unparsable values.
    pub fn load() -> Result<Self> {
        Self::load_from(Toml::file("jive.toml"))
    }

    /// Load with an explicit TOML provider (tests point this at a temp
    /// file).
    ///
    /// # Errors
    ///
    /// Returns a configuration error on unparsable values.
    pub fn load_from(toml: figment::providers::Data<Toml>) -> Result<Self> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(toml)
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| Error::config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tool_timeout_secs == 0 {
            return Err(Error::config("tool_timeout_secs must be positive"));
        }
        if self.max_in_flight == 0 {
            return Err(Error::config("max_in_flight must be positive"));
        }
        if self.max_response_bytes < 1024 {
            return Err(Error::config("max_response_bytes must be at least 1024"));
        }
        if !matches!(self.tool_mode.as_str(), "consolidated" | "full") {
            return Err(Error::config(format!(
                "tool_mode must be 'consolidated' or 'full', got '{}'",
                self.tool_mode
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tool_timeout_secs, 30);
        assert_eq!(config.max_in_flight, 64);
        assert_eq!(config.max_queued, 256);
        assert_eq!(config.max_response_bytes, 50_000);
        assert!(config.legacy_support);
    }

    #[test]
    #[serial]
    #[allow(unsafe_code)]
    fn environment_overrides_defaults() {
        // Env mutation is process-global; serialized with the other tests
        unsafe {
            std::env::set_var("MCP_JIVE_TOOL_TIMEOUT_SECS", "10");
            std::env::set_var("MCP_JIVE_LEGACY_SUPPORT", "false");
        }
        let config = AppConfig::load_from(Toml::string("")).unwrap();
        unsafe {
            std::env::remove_var("MCP_JIVE_TOOL_TIMEOUT_SECS");
            std::env::remove_var("MCP_JIVE_LEGACY_SUPPORT");
        }
        assert_eq!(config.tool_timeout_secs, 10);
        assert!(!config.legacy_support);
    }

    #[test]
    #[serial]
    fn toml_layer_sits_between_defaults_and_env() {
        let config = AppConfig::load_from(Toml::string(
            r#"
            tool_mode = "full"
            max_response_bytes = 20000
            "#,
        ))
        .unwrap();
        assert_eq!(config.tool_mode, "full");
        assert_eq!(config.max_response_bytes, 20_000);
        assert_eq!(config.tool_timeout_secs, 30);
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        let err = AppConfig::load_from(Toml::string("tool_mode = \"nonsense\"")).unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert!(err.to_string().contains("tool_mode"));
    }
}
