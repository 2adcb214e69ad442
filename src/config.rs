use config::{Config, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 30;
const DEFAULT_UPSTREAM_CALL_TIMEOUT_SECS: u64 = 10;
const CONFIG_DIR: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Application configuration.
///
/// Loaded from `config/default.toml` (optional), `config/{environment}.toml`
/// (optional) and `APP__`-prefixed environment variables, in that order.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Connection URL for the local portal database (projection store).
    pub local_database_url: String,

    /// Connection URL for the ERP read replica.
    pub erp_database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Freshness window for the process-wide MRP run cache.
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// End-to-end deadline applied to every HTTP request.
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_request_deadline")]
    pub request_deadline_secs: u64,

    /// Timeout for each individual ERP snapshot query.
    #[validate(range(min = 1, max = 120))]
    #[serde(default = "default_upstream_timeout")]
    pub upstream_call_timeout_secs: u64,

    /// Absolute tolerance used for all quantity comparisons.
    #[serde(default = "default_qty_tolerance")]
    pub qty_tolerance: Decimal,

    /// BOM lines with a scrap percentage above this cap are rejected.
    #[serde(default = "default_scrap_cap")]
    pub scrap_cap_percent: Decimal,

    /// Component part-number prefixes excluded from the purchasing shortage
    /// report (shop consumables carry a dedicated prefix in the ERP).
    #[serde(default = "default_shortage_exclude_prefixes")]
    pub shortage_exclude_prefixes: Vec<String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_request_deadline() -> u64 {
    DEFAULT_REQUEST_DEADLINE_SECS
}
fn default_upstream_timeout() -> u64 {
    DEFAULT_UPSTREAM_CALL_TIMEOUT_SECS
}
fn default_qty_tolerance() -> Decimal {
    dec!(0.01)
}
fn default_scrap_cap() -> Decimal {
    dec!(100)
}
fn default_shortage_exclude_prefixes() -> Vec<String> {
    vec!["W".to_string()]
}

impl AppConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn upstream_call_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_call_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine-facing subset, detached from the server settings so the
    /// allocation code never sees the full config.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            qty_tolerance: self.qty_tolerance,
            scrap_cap_percent: self.scrap_cap_percent,
            shortage_exclude_prefixes: self.shortage_exclude_prefixes.clone(),
        }
    }
}

/// The knobs the allocation engine and aggregator actually consume.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub qty_tolerance: Decimal,
    pub scrap_cap_percent: Decimal,
    pub shortage_exclude_prefixes: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            qty_tolerance: default_qty_tolerance(),
            scrap_cap_percent: default_scrap_cap(),
            shortage_exclude_prefixes: default_shortage_exclude_prefixes(),
        }
    }
}

/// Loads and validates the application configuration.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

    let mut builder = Config::builder();

    let default_file = Path::new(CONFIG_DIR).join("default");
    let env_file = Path::new(CONFIG_DIR).join(&environment);
    builder = builder
        .add_source(File::from(default_file).required(false))
        .add_source(File::from(env_file).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_operational_contract() {
        assert_eq!(default_cache_ttl(), 60);
        assert_eq!(default_request_deadline(), 30);
        assert_eq!(default_upstream_timeout(), 10);
        assert_eq!(default_qty_tolerance(), dec!(0.01));
        assert_eq!(default_scrap_cap(), dec!(100));
        assert_eq!(default_shortage_exclude_prefixes(), vec!["W".to_string()]);
    }

    #[test]
    fn validation_rejects_zero_cache_ttl() {
        let cfg = AppConfig {
            local_database_url: "sqlite::memory:".into(),
            erp_database_url: "sqlite::memory:".into(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            cache_ttl_secs: 0,
            request_deadline_secs: default_request_deadline(),
            upstream_call_timeout_secs: default_upstream_timeout(),
            qty_tolerance: default_qty_tolerance(),
            scrap_cap_percent: default_scrap_cap(),
            shortage_exclude_prefixes: default_shortage_exclude_prefixes(),
        };
        assert!(cfg.validate().is_err());
    }
}
