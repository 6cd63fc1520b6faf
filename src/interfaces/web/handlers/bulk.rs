use std::time::Duration;

use axum::{
    Extension, Json,
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::super::AppState;
use super::super::auth::{
    BULK_START_GROUPS, BULK_VALIDATE_GROUPS, CurrentUser, DESIGN_COORDINATOR_GROUPS, require_groups,
};
use crate::core::bulk::export::{DEFAULT_PAGE_LIMIT, EXPORT_FILE_NAME};
use crate::core::bulk::{
    ExportOutcome, Sheet, SheetRow, delete_ids, export_csv, process_data, run_bulk_delete,
    start_rows, validate_upload,
};

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

/// The first file part of a multipart body.
async fn uploaded_file(mut multipart: Multipart) -> Result<Bytes, Response> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.file_name().is_some() || field.name() == Some("file") => {
                return field.bytes().await.map_err(IntoResponse::into_response);
            }
            Ok(Some(_)) => continue,
            Ok(None) => return Err(bad_request("No file uploaded")),
            Err(e) => return Err(e.into_response()),
        }
    }
}

pub async fn validate(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Response {
    if let Err(denied) = require_groups(&user, BULK_VALIDATE_GROUPS) {
        return denied;
    }
    let data = match uploaded_file(multipart).await {
        Ok(data) => data,
        Err(response) => return response,
    };
    let validation = validate_upload(&state.engine, &state.config.bulk, &data).await;
    Json(validation.to_json()).into_response()
}

#[derive(Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    rows: Vec<SheetRow>,
}

pub async fn start(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<StartRequest>,
) -> Response {
    if let Err(denied) = require_groups(&user, BULK_START_GROUPS) {
        return denied;
    }
    info!(user = %user.id(), rows = request.rows.len(), "Bulk start requested");
    let report = start_rows(&state.engine, &state.config.bulk, request.rows).await;
    Json(report).into_response()
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Response {
    if let Err(denied) = require_groups(&user, DESIGN_COORDINATOR_GROUPS) {
        return denied;
    }
    let data = match uploaded_file(multipart).await {
        Ok(data) => data,
        Err(response) => return response,
    };
    let sheet = match Sheet::parse(&data) {
        Ok(sheet) => sheet,
        Err(e) => {
            warn!("Unreadable delete sheet: {:#}", e);
            return bad_request("Invalid CSV file format");
        }
    };
    let ids = match delete_ids(&sheet) {
        Ok(ids) => ids,
        Err(error) => return bad_request(error),
    };
    info!(user = %user.id(), count = ids.len(), "Bulk delete requested");
    let delay = Duration::from_millis(state.config.bulk.delete_delay_ms);
    Json(run_bulk_delete(&state.engine, ids, delay).await).into_response()
}

#[derive(Deserialize, Default)]
pub struct ExportRequest {
    start_date: Option<String>,
    end_date: Option<String>,
}

pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ExportRequest>,
) -> Response {
    if let Err(denied) = require_groups(&user, DESIGN_COORDINATOR_GROUPS) {
        return denied;
    }
    let start = request.start_date.filter(|d| !d.is_empty());
    let end = request.end_date.filter(|d| !d.is_empty());
    match export_csv(&state.engine, &state.history, start.as_deref(), end.as_deref()).await {
        Ok(ExportOutcome::Csv(bytes)) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", EXPORT_FILE_NAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Ok(ExportOutcome::NoInstances) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "No process instances found" })),
        )
            .into_response(),
        Ok(ExportOutcome::NoData) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "No data found" })),
        )
            .into_response(),
        Err(e) => {
            warn!("Export failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn process_data_filters(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(denied) = require_groups(&user, DESIGN_COORDINATOR_GROUPS) {
        return denied;
    }
    match state.history.process_filter_values().await {
        Ok(filters) => Json(json!({ "filters": filters })).into_response(),
        Err(e) => {
            warn!("Process data filters failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn process_data_rows(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(mut query): Query<IndexMap<String, String>>,
) -> Response {
    if let Err(denied) = require_groups(&user, DESIGN_COORDINATOR_GROUPS) {
        return denied;
    }
    let limit = query
        .shift_remove("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = query
        .shift_remove("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    match process_data(&state.history, &query, limit, offset).await {
        Ok(rows) => Json(json!({ "rows": rows })).into_response(),
        Err(e) => {
            warn!("Process data query failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
