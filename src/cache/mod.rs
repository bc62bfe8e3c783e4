//! Result cache for aeroquery
//!
//! Maps plan fingerprints to finished results. Entries live for a fixed
//! TTL from insertion; overflow evicts the least-recently-inserted entry.
//! Concurrent requests for the same fingerprint share one computation.

mod config;
mod errors;
mod result_cache;

pub use config::{CacheConfig, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use errors::{CacheError, CacheResult};
pub use result_cache::{CacheStats, CacheStatus, ResultCache};
