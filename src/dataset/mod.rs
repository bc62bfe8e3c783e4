//! Dataset subsystem for aeroquery
//!
//! Uploaded files are stored under server-assigned numeric ids and never
//! under user-supplied names. Each dataset carries a schema sniffed from a
//! bounded sample and a content version that keys the result cache.
//!
//! # Design Principles
//!
//! - Ids are allocated under a single lock and are gap-free per store
//! - Records are immutable; a schema refresh replaces the record
//! - A failed schema sniff keeps the upload and records the error

mod errors;
mod infer;
mod store;
mod types;

pub use errors::{DatasetError, DatasetResult};
pub use infer::{from_arrow, infer_schema, read_json_records, MIN_SAMPLE_ROWS};
pub use store::{DatasetStore, Ingested};
pub use types::{Column, ColumnType, Dataset, DatasetFormat, Schema};
