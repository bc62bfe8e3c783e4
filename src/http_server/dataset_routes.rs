//! Dataset HTTP Routes
//!
//! Upload, listing, metadata, preview and schema refresh.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{ApiError, ApiResult};
use super::extract::caller_from_headers;
use crate::dataset::Dataset;
use crate::engine::QueryEngine;
use crate::executor::QueryResult;

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub dataset_id: u64,
    pub name: String,
    pub format: String,
    pub schema: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetResponse {
    pub dataset_id: u64,
    pub name: String,
    pub format: String,
    pub schema: Map<String, Value>,
    pub content_version: String,
    pub size_bytes: u64,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<String>,
}

impl From<&Dataset> for DatasetResponse {
    fn from(ds: &Dataset) -> Self {
        Self {
            dataset_id: ds.id,
            name: ds.name.clone(),
            format: ds.format.to_string(),
            schema: ds.schema.to_json_map(),
            content_version: ds.content_version.clone(),
            size_bytes: ds.size_bytes,
            created_at: ds.created_at.to_rfc3339(),
            schema_error: ds.schema_error.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetsListResponse {
    pub datasets: Vec<DatasetResponse>,
    pub total: usize,
}

// ==================
// Dataset Routes
// ==================

/// Create dataset routes
pub fn dataset_routes(engine: Arc<QueryEngine>) -> Router {
    Router::new()
        .route("/", get(list_datasets_handler))
        .route("/upload", post(upload_handler))
        .route("/:id", get(get_dataset_handler))
        .route("/:id/preview", get(preview_handler))
        .route("/:id/schema", post(refresh_schema_handler))
        .with_state(engine)
}

// ==================
// Handlers
// ==================

/// Multipart fields: `name`, optional `format`, `file`
async fn upload_handler(
    State(engine): State<Arc<QueryEngine>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let caller = caller_from_headers(&headers)?;

    let mut name = String::new();
    let mut format: Option<String> = None;
    let mut file: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = read_text(field).await?,
            "format" => format = Some(read_text(field).await?),
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read file: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("file field is required"))?;

    let outcome = engine
        .upload(&caller, &name, format.as_deref(), file_name.as_deref(), bytes)
        .await?;

    let ds = &outcome.dataset;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            dataset_id: ds.id,
            name: ds.name.clone(),
            format: ds.format.to_string(),
            schema: ds.schema.to_json_map(),
            warning: outcome.warning,
        }),
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart field: {}", e)))
}

async fn list_datasets_handler(
    State(engine): State<Arc<QueryEngine>>,
) -> ApiResult<Json<DatasetsListResponse>> {
    let datasets: Vec<DatasetResponse> = engine
        .list()?
        .iter()
        .map(|ds| DatasetResponse::from(ds.as_ref()))
        .collect();

    Ok(Json(DatasetsListResponse {
        total: datasets.len(),
        datasets,
    }))
}

async fn get_dataset_handler(
    State(engine): State<Arc<QueryEngine>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<DatasetResponse>> {
    let ds = engine.get(id)?;
    Ok(Json(DatasetResponse::from(ds.as_ref())))
}

async fn preview_handler(
    State(engine): State<Arc<QueryEngine>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<QueryResult>> {
    Ok(Json(engine.preview(id).await?))
}

async fn refresh_schema_handler(
    State(engine): State<Arc<QueryEngine>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> ApiResult<Json<DatasetResponse>> {
    let caller = caller_from_headers(&headers)?;
    let ds = engine.refresh_schema(&caller, id).await?;
    Ok(Json(DatasetResponse::from(ds.as_ref())))
}
