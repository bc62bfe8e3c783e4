//! Observable events for aeroquery
//!
//! Every log line carries an `event` field naming one of these variants.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    BootStart,
    BootComplete,
    ConfigLoaded,
    Serving,
    ShutdownStart,
    ShutdownComplete,

    // Datasets
    DatasetIngested,
    /// Stored, but the schema sniff failed
    DatasetIngestWarning,
    DatasetSchemaRefreshed,

    // Queries
    QueryReceived,
    QueryPlanned,
    QueryExecuting,
    QueryExecuted,
    QueryRejected,
    QueryFailed,
    QueryTimedOut,

    // Cache
    CacheHit,
    CacheMiss,
    CacheCoalesced,
    CacheEvicted,
    CacheExpired,
    /// Cache state unavailable; treated as a miss
    CacheError,

    // Audit
    AuditWriteFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "AEROQUERY_STARTUP_BEGIN",
            Event::BootComplete => "AEROQUERY_STARTUP_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "AEROQUERY_SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::DatasetIngested => "DATASET_INGESTED",
            Event::DatasetIngestWarning => "DATASET_INGEST_WARNING",
            Event::DatasetSchemaRefreshed => "DATASET_SCHEMA_REFRESHED",

            Event::QueryReceived => "QUERY_BEGIN",
            Event::QueryPlanned => "QUERY_PLANNED",
            Event::QueryExecuting => "QUERY_EXECUTING",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::QueryFailed => "QUERY_FAILED",
            Event::QueryTimedOut => "QUERY_TIMED_OUT",

            Event::CacheHit => "CACHE_HIT",
            Event::CacheMiss => "CACHE_MISS",
            Event::CacheCoalesced => "CACHE_COALESCED",
            Event::CacheEvicted => "CACHE_EVICTED",
            Event::CacheExpired => "CACHE_EXPIRED",
            Event::CacheError => "CACHE_ERROR",

            Event::AuditWriteFailed => "AUDIT_WRITE_FAILED",
        }
    }

    /// Events logged at WARN rather than INFO
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::DatasetIngestWarning
                | Event::QueryFailed
                | Event::QueryTimedOut
                | Event::CacheError
                | Event::AuditWriteFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::BootStart,
            Event::BootComplete,
            Event::ConfigLoaded,
            Event::Serving,
            Event::ShutdownStart,
            Event::ShutdownComplete,
            Event::DatasetIngested,
            Event::DatasetIngestWarning,
            Event::DatasetSchemaRefreshed,
            Event::QueryReceived,
            Event::QueryPlanned,
            Event::QueryExecuting,
            Event::QueryExecuted,
            Event::QueryRejected,
            Event::QueryFailed,
            Event::QueryTimedOut,
            Event::CacheHit,
            Event::CacheMiss,
            Event::CacheCoalesced,
            Event::CacheEvicted,
            Event::CacheExpired,
            Event::CacheError,
            Event::AuditWriteFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_warning_events() {
        assert!(Event::CacheError.is_warning());
        assert!(Event::AuditWriteFailed.is_warning());
        assert!(!Event::QueryExecuted.is_warning());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::CacheEvicted), "CACHE_EVICTED");
    }
}
