// packages/engine/src/utils/config.rs
//! Engine configuration
//!
//! Loaded from built-in defaults, an optional file and `PROXY_ENGINE__*`
//! environment variables (later sources override earlier ones).

use crate::utils::errors::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PROXY_ENGINE";

/// What a forwarded operation does when its handler fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the failure to the caller of the proxy operation
    #[default]
    Propagate,

    /// Record the failure and return the declared type's default value
    Swallow,
}

/// Proxy construction and invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Invocation-time failure policy
    pub failure_policy: FailurePolicy,

    /// Reuse built proxy types across requests for the same contract
    pub cache_types: bool,

    /// Number of failure records kept per proxy instance
    pub failure_log_capacity: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Propagate,
            cache_types: false,
            failure_log_capacity: 256,
        }
    }
}

impl ProxyConfig {
    /// Compatibility mode: handler failures degrade to default values
    pub fn swallowing() -> Self {
        Self {
            failure_policy: FailurePolicy::Swallow,
            ..Self::default()
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub proxy: ProxyConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from the environment on top of defaults
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(Self::environment())
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(Self::environment())
            .build()?;

        let config: EngineConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.proxy.failure_log_capacity == 0 {
            return Err(ProxyError::Config(
                "proxy.failure_log_capacity must be at least 1".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ProxyError::Config("logging.level must not be empty".to_string()));
        }
        Ok(())
    }
}
