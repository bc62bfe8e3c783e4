//! Query Executor subsystem for aeroquery
//!
//! Runs compiled plans against one dataset at a time and returns rows as
//! ordered JSON objects.
//!
//! # Execution Flow (strict order)
//!
//! 1. Open a fresh session with the dataset registered as `"dataset"`
//! 2. Plan the text under read-only options
//! 3. Collect at most `row_cap + 1` rows
//! 4. Convert to JSON rows, marking truncation
//!
//! The whole flow runs under a timeout. Error messages never carry
//! filesystem paths.

mod errors;
#[allow(clippy::module_inception)]
mod executor;
mod relation;
mod result;
mod scrub;

pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use executor::{DataFusionExecutor, PlanExecutor, DEFAULT_ROW_CAP, DEFAULT_TIMEOUT};
pub use result::QueryResult;
pub use scrub::scrub_paths;
