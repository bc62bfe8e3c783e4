//! Observability subsystem for aeroquery
//!
//! - Structured JSON logging through `tracing`
//! - Atomic counters
//! - Audit records for query runs and uploads
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. A failing sink never fails a request

pub mod audit;
mod events;
mod metrics;

pub use audit::{
    AuditAction, AuditOutcome, AuditRecord, AuditSink, FileAuditLog, MemoryAuditLog,
    NullAuditLog,
};
pub use events::Event;
pub use metrics::{MetricsRegistry, MetricsSnapshot};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the global JSON subscriber on stderr.
///
/// `RUST_LOG` overrides `default_filter`. Calling this twice is harmless.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    if event.is_warning() {
        warn!(event = event.as_str());
    } else {
        info!(event = event.as_str());
    }
}

/// Appends `record`, logging instead of failing when the sink errors.
pub fn audit(sink: &dyn AuditSink, record: &AuditRecord) {
    if let Err(err) = sink.append(record) {
        warn!(
            event = Event::AuditWriteFailed.as_str(),
            action = record.action.as_str(),
            error = %err,
            "audit append failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn append(&self, _record: &AuditRecord) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::BootStart);
        log_event(Event::CacheError);
    }

    #[test]
    fn test_failing_sink_does_not_panic() {
        let record = AuditRecord::new(AuditAction::QueryRun, AuditOutcome::Success, "u");
        audit(&FailingSink, &record);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("info");
        init_logging("debug");
    }
}
