//! # Link Telemetry
//!
//! Logging and metrics shared by the pairing-exchange crates.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON output
//! - **Metrics**: Prometheus counters for envelopes, acknowledgments and handshakes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use link_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // tracing macros and metric counters are live from here on
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PX_SERVICE_NAME` | `pairing-exchange` | Service name attached to logs |
//! | `PX_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `PX_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PX_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, ACKS_SENT, ENVELOPES_RECEIVED, ENVELOPES_SENT, HANDSHAKES,
    PENDING_REQUESTS, VERIFICATION_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The tracing subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A collector could not be registered.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { config })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    config: TelemetryConfig,
}

impl TelemetryGuard {
    /// Configuration the telemetry stack was started with.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.config.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "pairing-exchange");
    }

    #[test]
    fn test_metric_inc_macro() {
        let before = ACKS_SENT.get();
        metric_inc!(ACKS_SENT);
        assert!(ACKS_SENT.get() >= before + 1.0);

        metric_inc!(HANDSHAKES, &["success"]);
        assert!(HANDSHAKES.with_label_values(&["success"]).get() >= 1.0);
    }
}
