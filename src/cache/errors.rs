//! # Result Cache Errors
//!
//! Never propagated past the cache: every `CacheError` is logged and the
//! lookup is treated as a miss.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache state lock poisoned")]
    StatePoisoned,

    #[error("in-flight gate lock poisoned")]
    GatePoisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;
