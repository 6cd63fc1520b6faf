use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::super::AppState;
use super::super::auth::CurrentUser;
use super::tasks::{read_form, task_error_response};

pub async fn list_definitions(State(state): State<AppState>) -> Response {
    match state.engine.process_definitions().await {
        Ok(definitions) => {
            Json(json!({ "success": true, "definitions": definitions })).into_response()
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_start_form(
    State(state): State<AppState>,
    Path(definition_id): Path<String>,
) -> Json<serde_json::Value> {
    let page = state.tasks.start_page(&definition_id).await;
    Json(json!({ "success": true, "start": page }))
}

pub async fn start_instance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(definition_id): Path<String>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    match state.tasks.start_process(user.id(), &definition_id, &form).await {
        Ok(instance_id) => Json(json!({
            "success": true,
            "process_instance_id": instance_id,
        }))
        .into_response(),
        Err(e) => task_error_response(e),
    }
}
