use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::super::AppState;
use super::super::auth::CurrentUser;
use crate::core::tasks::{SubmittedForm, TaskError, TaskListFilter, TaskStatus};

/// Maps a task failure onto the status the API promises: hidden tasks are
/// 404, refused actions 409, engine refusals 502.
pub(crate) fn task_error_response(err: TaskError) -> Response {
    let status = match &err {
        TaskError::NotFound => StatusCode::NOT_FOUND,
        TaskError::Denied(_) => StatusCode::CONFLICT,
        TaskError::Engine(_) => StatusCode::BAD_GATEWAY,
        TaskError::Internal(e) => {
            warn!("Task request failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "success": false, "error": err.to_string() }))).into_response()
}

#[derive(Deserialize, Default)]
pub struct TaskListQuery {
    site: Option<String>,
    activity: Option<String>,
    status: Option<String>,
    name: Option<String>,
}

impl TaskListQuery {
    fn into_filter(self) -> TaskListFilter {
        let status = match self.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("pending") => Some(TaskStatus::Pending),
            Some("completed") => Some(TaskStatus::Completed),
            _ => None,
        };
        TaskListFilter {
            site: self.site.filter(|s| !s.is_empty()),
            activity: self.activity.filter(|s| !s.is_empty()),
            status,
            name: self.name,
        }
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TaskListQuery>,
) -> Json<serde_json::Value> {
    let stats = state.tasks.list(user.id(), &query.into_filter()).await;
    Json(json!({ "success": true, "summary": stats.summary, "tasks": stats.tasks }))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<String>,
) -> Response {
    match state.tasks.detail(user.id(), &task_id).await {
        Ok(task) => Json(json!({ "success": true, "task": task })).into_response(),
        Err(e) => task_error_response(e),
    }
}

pub async fn get_task_form(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<String>,
) -> Response {
    match state.tasks.form_page(user.id(), &task_id).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => task_error_response(e),
    }
}

/// Reads every multipart part into a [`SubmittedForm`].
pub(crate) async fn read_form(mut multipart: Multipart) -> Result<SubmittedForm, Response> {
    let mut form = SubmittedForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(e.into_response()),
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(IntoResponse::into_response)?;
        form.add_part(&name, file_name, content_type, data);
    }
    Ok(form)
}

pub async fn submit_task_form(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<String>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    match state.tasks.submit(user.id(), &task_id, form).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => task_error_response(e),
    }
}

pub async fn claim_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(task_id): Path<String>,
) -> Response {
    match state.tasks.claim(user.id(), &task_id).await {
        Ok(()) => Json(json!({ "success": true, "message": "Task claimed" })).into_response(),
        Err(e) => task_error_response(e),
    }
}
