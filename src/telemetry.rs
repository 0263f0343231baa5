//! Telemetry logic.
//! Support logging through a sink and outcome metrics.

use tracing_subscriber::EnvFilter;

const TARGET: &str = "dirauth::directory";

/// Port for diagnostic messages emitted by the connector.
///
/// Implementations must not block the caller meaningfully nor panic.
pub trait LogSink: Send + Sync {
    fn debug(&self, message: &str);

    fn error(&self, message: &str);
}

/// Tracing-based log sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl TracingLogSink {
    /// Create a new [`TracingLogSink`].
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingLogSink {
    fn debug(&self, message: &str) {
        tracing::debug!(target: TARGET, "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: TARGET, "{message}");
    }
}

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Meant for host binaries; does nothing if a subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Count a bind attempt by outcome.
pub(crate) fn record_bind(outcome: &'static str) {
    metrics::counter!("directory_binds_total", "outcome" => outcome)
        .increment(1);
}

/// Count a search by outcome.
pub(crate) fn record_search(outcome: &'static str) {
    metrics::counter!("directory_searches_total", "outcome" => outcome)
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_sink_never_panics() {
        init();
        init();

        let sink = TracingLogSink::new();
        sink.debug("Initializing LDAP connection to ldap://localhost");
        sink.error("Invalid credentials to bind to LDAP as CN=bob");

        record_bind("success");
        record_search("error");
    }
}
