use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::LedgerPolicy;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_ACTOR: &str = "system";
const CONFIG_DIR: &str = "config";

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1), custom = "validate_database_url")]
    pub database_url: String,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 1000))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Actor recorded on ledger rows when the caller does not name one
    #[serde(default = "default_actor")]
    #[validate(length(min = 1, max = 64))]
    pub default_actor: String,

    /// Let postings drive available stock below zero
    #[serde(default)]
    pub allow_negative_stock: bool,

    /// Reject downstream lines that would exceed their upstream line quantity
    #[serde(default = "default_true_bool")]
    pub enforce_fulfillment_limit: bool,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the connection target.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            default_actor: default_actor(),
            allow_negative_stock: false,
            enforce_fulfillment_limit: true,
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Stock rules handed to the ledger engines.
    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            allow_negative_stock: self.allow_negative_stock,
            enforce_fulfillment_limit: self.enforce_fulfillment_limit,
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections_exceeds_max");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.is_production() && self.allow_negative_stock {
            let mut err = ValidationError::new("negative_stock_in_production");
            err.message = Some(
                "allow_negative_stock must stay off in production. Unset APP__ALLOW_NEGATIVE_STOCK."
                    .into(),
            );
            errors.add("allow_negative_stock", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

fn default_true_bool() -> bool {
    true
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_database_url(url: &str) -> Result<(), ValidationError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") || url.starts_with("sqlite:")
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("database_url");
        err.message = Some("Must be a postgres:// or sqlite: connection URL".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("inventory_ledger={},sea_orm=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration from `./config`.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let default_file = config_dir.join("default");
    let env_file = config_dir.join(&run_env);

    let config = Config::builder()
        .set_default("database_url", "sqlite://inventory_ledger.db?mode=rwc")?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("default_actor", DEFAULT_ACTOR)?
        .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_config(content: &str, filename: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(filename), content).unwrap();
        temp_dir
    }

    #[test]
    fn loads_file_values_over_defaults() {
        let dir = setup_test_config(
            r#"
            database_url = "postgres://localhost/ledger"
            log_level = "debug"
            default_actor = "importer"
            enforce_fulfillment_limit = false
            "#,
            "default.toml",
        );

        let config = load_config_from(dir.path()).unwrap();

        assert_eq!(config.database_url(), "postgres://localhost/ledger");
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.default_actor, "importer");
        assert!(!config.ledger_policy().enforce_fulfillment_limit);
        assert!(!config.ledger_policy().allow_negative_stock);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let dir = setup_test_config(
            r#"
            database_url = "sqlite::memory:"
            log_level = "loud"
            "#,
            "default.toml",
        );

        let result = load_config_from(dir.path());
        match result {
            Err(AppConfigError::Validation(errors)) => {
                assert!(errors.field_errors().contains_key("log_level"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn pool_bounds_are_checked() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.db_min_connections = 5;
        cfg.db_max_connections = 2;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn negative_stock_is_refused_in_production() {
        let mut cfg = AppConfig::new("postgres://db/ledger".into(), "production".into());
        assert!(cfg.validate_additional_constraints().is_ok());
        cfg.allow_negative_stock = true;
        assert!(cfg.validate_additional_constraints().is_err());
    }
}
