/*!
 * Structured Tracing
 *
 * Subscriber setup for the `tracing` events emitted by counters and
 * reducers. Fork, join and merge events are `debug`/`trace`; poisoning,
 * failed partitions and timeouts are `warn`.
 */

use tracing::info;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter,
};

/// Environment variable switching the subscriber to JSON output
pub const TRACE_JSON_ENV: &str = "ACCUMULATOR_TRACE_JSON";

/// Output format for the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// Human-readable, one line per event
    Compact,
    /// JSON with span lists, for log pipelines
    Json,
}

impl TraceFormat {
    /// `Json` when `ACCUMULATOR_TRACE_JSON` is `1` or `true`
    pub fn from_env() -> Self {
        let use_json = std::env::var(TRACE_JSON_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if use_json {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

/// Install the global subscriber
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - ACCUMULATOR_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match TraceFormat::from_env() {
        TraceFormat::Json => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .try_init()?;
            info!("Structured tracing initialized with JSON output");
        }
        TraceFormat::Compact => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .compact(),
                )
                .try_init()?;
            info!("Structured tracing initialized");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error() {
        // Another test may have installed a subscriber first
        let _ = init_tracing();
        assert!(init_tracing().is_err());
    }
}
