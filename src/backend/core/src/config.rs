//! Configuration management.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Result, RoleSyncError};
use crate::telemetry::LoggingConfig;

/// Main engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend endpoint configuration
    pub backend: BackendConfig,

    /// Reconciliation engine behaviour
    #[serde(default)]
    pub engine: EngineConfig,

    /// Access guard destinations
    #[serde(default)]
    pub guard: GuardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL the `roles` endpoints hang off (e.g. `https://host/api`)
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Bearer token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: default_timeout(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Substitute static roles / sample baselines when reads fail
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    /// Select the first role once the directory loads
    #[serde(default = "default_true")]
    pub auto_select_first_role: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            auto_select_first_role: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Where unauthenticated navigations are sent
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Where unauthorized navigations are sent
    #[serde(default = "default_forbidden_path")]
    pub forbidden_path: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            forbidden_path: default_forbidden_path(),
        }
    }
}

// Default value functions
fn default_timeout() -> Duration { Duration::from_secs(30) }
fn default_true() -> bool { true }
fn default_login_path() -> String { "/login".to_string() }
fn default_forbidden_path() -> String { "/forbidden".to_string() }

impl Config {
    /// Load configuration from `ROLESYNC__*` environment variables.
    ///
    /// A `.env` file in the working directory is read first, if present.
    pub fn load() -> Result<Self> {
        Self::load_with_defaults(&[])
    }

    /// Like [`Config::load`], with `defaults` (dotted keys such as
    /// `backend.base_url`) filling whatever the environment leaves unset.
    pub fn load_with_defaults(defaults: &[(&str, &str)]) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        for (key, value) in defaults {
            builder = builder.set_default(*key, *value)?;
        }
        Self::build(builder)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        Self::build(config::Config::builder().add_source(config::File::with_name(path)))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(config::Environment::with_prefix("ROLESYNC").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration for a backend URL with every other section defaulted.
    pub fn for_backend(base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::new(base_url),
            engine: EngineConfig::default(),
            guard: GuardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(RoleSyncError::configuration("backend.base_url must not be empty"));
        }
        if self.backend.timeout.is_zero() {
            return Err(RoleSyncError::configuration("backend.timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_for_backend() {
        let cfg = Config::for_backend("http://localhost:8080/api");
        assert_eq!(cfg.backend.timeout, Duration::from_secs(30));
        assert!(cfg.engine.fallback_enabled);
        assert!(cfg.engine.auto_select_first_role);
        assert_eq!(cfg.guard.login_path, "/login");
        assert_eq!(cfg.guard.forbidden_path, "/forbidden");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let cfg = Config::for_backend("  ");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_layers_environment_over_defaults() {
        std::env::set_var("ROLESYNC__BACKEND__AUTH_TOKEN", "env-token");
        std::env::set_var("ROLESYNC__LOGGING__INCLUDE_LOCATION", "true");

        let cfg = Config::load_with_defaults(&[
            ("backend.base_url", "http://defaults.local/api"),
            ("backend.auth_token", "default-token"),
            ("logging.level", "warn"),
        ])
        .unwrap();

        std::env::remove_var("ROLESYNC__BACKEND__AUTH_TOKEN");
        std::env::remove_var("ROLESYNC__LOGGING__INCLUDE_LOCATION");

        assert_eq!(cfg.backend.base_url, "http://defaults.local/api");
        assert_eq!(cfg.backend.auth_token.as_deref(), Some("env-token"));
        assert_eq!(cfg.logging.level, "warn");
        assert!(cfg.logging.include_location);
    }

    #[test]
    fn test_load_requires_backend_url() {
        let err = Config::load_with_defaults(&[("backend.base_url", " ")]).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidConfiguration);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
base_url = "http://backend.local/api"
timeout = "5s"

[engine]
fallback_enabled = false

[guard]
forbidden_path = "/403"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.backend.base_url, "http://backend.local/api");
        assert_eq!(cfg.backend.timeout, Duration::from_secs(5));
        assert!(!cfg.engine.fallback_enabled);
        assert!(cfg.engine.auto_select_first_role);
        assert_eq!(cfg.guard.forbidden_path, "/403");
        assert_eq!(cfg.guard.login_path, "/login");
    }
}
