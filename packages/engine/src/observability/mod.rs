// packages/engine/src/observability/mod.rs
//! Logging and metrics setup
//!
//! The library only emits `tracing` events and `metrics` counters; these
//! helpers install a subscriber and a Prometheus recorder for applications
//! and tests that want to see them.
//!
//! Counters:
//!
//! - `proxy_builds_total`: proxy types built
//! - `proxy_build_failures_total`: definitions rejected by the loader
//! - `proxy_invocations_total`: calls reaching a handler
//! - `proxy_invocation_failures_total`: failed forwarded calls

use crate::utils::config::LoggingConfig;
use anyhow::{anyhow, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

/// Install the Prometheus recorder, once per process
///
/// Returns the handle used to render the scrape output.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .cloned()
        .map_err(|e| anyhow!("failed to install metrics recorder: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        let handle = init_metrics().unwrap();
        assert!(init_metrics().is_ok());

        metrics::counter!("proxy_builds_total").increment(1);
        assert!(handle.render().contains("proxy_builds_total"));
    }

    #[test]
    fn test_subscriber_installed_once() {
        let config = LoggingConfig::default();
        if init_tracing(&config).is_ok() {
            assert!(init_tracing(&config).is_err());
        }
    }
}
