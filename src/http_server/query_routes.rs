//! Query HTTP Routes
//!
//! `POST /queries/build` compiles without executing; `POST /queries/run`
//! compiles, executes through the result cache and audits.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::ApiResult;
use super::extract::{caller_from_headers, decode_json};
use crate::engine::{EngineError, QueryEngine};
use crate::planner::{QueryRequest, RunQueryBody, Specification};

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildResponse {
    pub plan_text: String,
    pub fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub truncated: bool,
    pub fingerprint: String,
    pub cached: bool,
    /// hit, miss or coalesced
    pub cache: String,
}

// ==================
// Query Routes
// ==================

/// Create query routes
pub fn query_routes(engine: Arc<QueryEngine>) -> Router {
    Router::new()
        .route("/build", post(build_handler))
        .route("/run", post(run_handler))
        .with_state(engine)
}

async fn build_handler(
    State(engine): State<Arc<QueryEngine>>,
    body: Bytes,
) -> ApiResult<Json<BuildResponse>> {
    let spec: Specification = decode_json(&body)?;
    let plan = engine.build(&spec)?;

    Ok(Json(BuildResponse {
        plan_text: plan.text,
        fingerprint: plan.fingerprint.to_string(),
    }))
}

async fn run_handler(
    State(engine): State<Arc<QueryEngine>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<RunResponse>> {
    let caller = caller_from_headers(&headers)?;
    let body: RunQueryBody = decode_json(&body)?;
    let request = QueryRequest::try_from(body).map_err(EngineError::from)?;

    let outcome = engine.run(&caller, request).await?;
    let result = outcome.result.as_ref();

    Ok(Json(RunResponse {
        columns: result.columns.clone(),
        rows: result.rows.clone(),
        truncated: result.truncated,
        fingerprint: outcome.fingerprint.to_string(),
        cached: outcome.cached(),
        cache: outcome.status.as_str().to_string(),
    }))
}
