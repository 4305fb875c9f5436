//! Telemetry: structured logging and reconciliation metrics.
//!
//! - **Logging**: JSON/pretty/compact `tracing` output with token redaction
//! - **Metrics**: counters for fallbacks, sync attempts, saves and errors
//!
//! # Example
//!
//! ```rust,no_run
//! use rolesync_core::telemetry::{init_telemetry, LoggingConfig};
//!
//! init_telemetry(&LoggingConfig::default()).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig, RedactionConfig, TokenRedactor};
pub use metrics::{describe_metrics, RequestTimer, SyncMetrics};

/// Initialize logging and register metric descriptions.
///
/// Call once at process start.
pub fn init_telemetry(config: &LoggingConfig) -> anyhow::Result<()> {
    describe_metrics();
    init_logging(config)?;
    ::tracing::debug!("Telemetry initialized");
    Ok(())
}
