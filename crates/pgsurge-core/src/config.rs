//! Configuration for the pgsurge service.
//!
//! Supports a YAML/TOML config file, `PGSURGE`-prefixed environment
//! variable overrides, defaults for every option, and validation.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the load generator service.
///
/// Every field has a documented default; the config file and environment
/// variables are both optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Connection URL the workers dial. Point this at the pooler under test.
    pub database_url: String,

    /// Port the HTTP/WebSocket control surface listens on.
    pub http_port: u16,

    /// Initial connection count applied at startup.
    pub default_connections: u32,

    /// Initial read QPS applied at startup.
    pub default_read_qps: u32,

    /// Initial write QPS applied at startup.
    pub default_write_qps: u32,

    /// Advisory upper bound on connections, surfaced to the dashboard.
    pub max_connections: u32,

    /// Advisory upper bound on read QPS, surfaced to the dashboard.
    pub max_read_qps: u32,

    /// Advisory upper bound on write QPS, surfaced to the dashboard.
    pub max_write_qps: u32,

    /// Metric snapshot cadence in milliseconds.
    pub metrics_interval_ms: u64,

    /// Scenario selected at startup.
    pub default_scenario: String,

    /// Table for the dynamic scenario ("schema.name" or "name"; empty
    /// means auto-discover).
    pub custom_table: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost:5432/pooler_demo".to_string(),
            http_port: 8080,
            default_connections: 10,
            default_read_qps: 100,
            default_write_qps: 10,
            max_connections: 20_000,
            max_read_qps: 500_000,
            max_write_qps: 500_000,
            metrics_interval_ms: 100,
            default_scenario: "simple".to_string(),
            custom_table: String::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration with precedence:
    /// 1. Environment variables (highest priority), e.g.
    ///    `PGSURGE_DATABASE_URL`, `PGSURGE_DEFAULT_READ_QPS`
    /// 2. `./config/pgsurge.{yaml,toml,json}`
    /// 3. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        builder = builder
            .add_source(File::with_name("./config/pgsurge").required(false))
            .add_source(
                Environment::with_prefix("PGSURGE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("database_url", "postgres://localhost:5432/pooler_demo")?
            .set_default("http_port", 8080)?
            .set_default("default_connections", 10)?
            .set_default("default_read_qps", 100)?
            .set_default("default_write_qps", 10)?
            .set_default("max_connections", 20_000)?
            .set_default("max_read_qps", 500_000)?
            .set_default("max_write_qps", 500_000)?
            .set_default("metrics_interval_ms", 100)?
            .set_default("default_scenario", "simple")?
            .set_default("custom_table", "")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::Message(
                "database_url must not be empty".to_string(),
            ));
        }

        if self.metrics_interval_ms == 0 {
            return Err(ConfigError::Message(
                "metrics_interval_ms must be > 0".to_string(),
            ));
        }

        if self.max_connections < self.default_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= default_connections".to_string(),
            ));
        }

        if self.max_read_qps < self.default_read_qps {
            return Err(ConfigError::Message(
                "max_read_qps must be >= default_read_qps".to_string(),
            ));
        }

        if self.max_write_qps < self.default_write_qps {
            return Err(ConfigError::Message(
                "max_write_qps must be >= default_write_qps".to_string(),
            ));
        }

        Ok(())
    }

    /// Snapshot cadence as a `Duration`.
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = AppConfig::default();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.default_connections, 10);
        assert_eq!(config.default_read_qps, 100);
        assert_eq!(config.default_write_qps, 10);
        assert_eq!(config.max_connections, 20_000);
        assert_eq!(config.metrics_interval_ms, 100);
        assert_eq!(config.default_scenario, "simple");
        assert!(config.custom_table.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_metrics_interval() {
        let config = AppConfig::default();
        assert_eq!(config.metrics_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();

        config.metrics_interval_ms = 0;
        assert!(config.validate().is_err());
        config.metrics_interval_ms = 100;
        assert!(config.validate().is_ok());

        config.max_connections = 5;
        assert!(config.validate().is_err());
        config.max_connections = 20_000;

        config.database_url = String::new();
        assert!(config.validate().is_err());
    }
}
