//! Query engine for aeroquery
//!
//! Ties the dataset store, compiler, executor, result cache, metrics and
//! audit sink together behind the boundary operations used by the HTTP
//! server and the CLI.
//!
//! # Design Principles
//!
//! 1. Every collaborator is passed in; no ambient globals
//! 2. One audit record per upload and per run request
//! 3. Audit failures never fail a request

#[allow(clippy::module_inception)]
mod engine;
mod errors;
mod identity;

pub use engine::{
    EngineConfig, EngineMetrics, QueryEngine, QueryOutcome, UploadOutcome, DEFAULT_PREVIEW_ROWS,
};
pub use errors::{EngineError, EngineResult};
pub use identity::{Caller, Role};
