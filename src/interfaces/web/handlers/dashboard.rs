use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::json;

use super::super::AppState;
use super::super::auth::CurrentUser;
use crate::core::history::{SummaryFilter, UserTaskFilter};

pub const DEFAULT_SUMMARY_START: &str = "2025-09-01";

#[derive(Deserialize, Default)]
pub struct SummaryQuery {
    start: Option<String>,
    end: Option<String>,
    circle: Option<String>,
    activity: Option<String>,
}

impl SummaryQuery {
    /// Missing bounds default to the reporting start and today.
    fn into_filter(self) -> SummaryFilter {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        SummaryFilter {
            start: non_empty(self.start).unwrap_or_else(|| DEFAULT_SUMMARY_START.to_string()),
            end: non_empty(self.end)
                .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
            circle: self.circle.unwrap_or_default(),
            activity: self.activity.unwrap_or_default(),
        }
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user": user.0,
        "display_name": user.0.display_name(),
    }))
}

pub async fn circle_head_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Json<serde_json::Value> {
    let summary = state.history.circle_head_summary(&query.into_filter()).await;
    Json(json!(summary))
}

pub async fn design_team_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Json<serde_json::Value> {
    let summary = state.history.design_team_summary(&query.into_filter()).await;
    Json(json!(summary))
}

pub async fn users(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "users": state.history.users().await }))
}

pub async fn groups(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "groups": state.history.groups().await }))
}

pub async fn user_activity_sites(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Json<serde_json::Value> {
    let sites = state.history.user_activity_sites(user.id()).await;
    Json(json!({ "success": true, "activities": sites }))
}

pub async fn activity_types(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "activity_types": state.history.activity_types().await }))
}

pub async fn site_ids(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "site_ids": state.history.site_ids().await }))
}

#[derive(Deserialize, Default)]
pub struct UserTaskQuery {
    site: Option<String>,
    activity: Option<String>,
}

pub async fn user_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<UserTaskQuery>,
) -> Json<serde_json::Value> {
    let filter = UserTaskFilter {
        site: query.site.filter(|s| !s.is_empty()),
        activity: query.activity.filter(|s| !s.is_empty()),
    };
    let stats = state.history.user_task_stats(user.id(), &filter).await;
    Json(json!({ "success": true, "summary": stats.summary, "tasks": stats.tasks }))
}
