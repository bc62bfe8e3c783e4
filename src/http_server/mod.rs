//! # HTTP boundary for aeroquery
//!
//! Axum router over one shared `QueryEngine`.
//!
//! # Endpoints
//!
//! - `POST /datasets/upload`, `GET /datasets`, `GET /datasets/:id`
//! - `GET /datasets/:id/preview`, `POST /datasets/:id/schema`
//! - `POST /queries/build`, `POST /queries/run`
//! - `/health`, `/observability/metrics`
//!
//! Caller identity comes from the `x-user-id` and `x-user-role` headers
//! set by the upstream gateway.

pub mod config;
pub mod dataset_routes;
pub mod errors;
pub mod extract;
pub mod observability_routes;
pub mod query_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use errors::{ApiError, ApiResult, ErrorResponse};
pub use server::HttpServer;
