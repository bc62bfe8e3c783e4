//! aeroquery - dataset query engine
//!
//! Ingests CSV/JSON datasets, compiles structured filter/group/aggregate
//! specifications into safe query plans, executes them with DataFusion and
//! caches results by plan fingerprint.

pub mod cache;
pub mod cli;
pub mod dataset;
pub mod engine;
pub mod executor;
pub mod http_server;
pub mod observability;
pub mod planner;
