use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::AppState;
use super::auth;
use super::handlers::{bulk, content, dashboard, process, tasks};

fn build_localhost_cors(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(dashboard::health))
        .layer(middleware::from_fn(security_headers))
        .with_state(state.clone());

    let authed_routes = Router::new()
        .route("/api/me", get(dashboard::me))
        .route("/api/dashboard/ch_summary", get(dashboard::circle_head_summary))
        .route("/api/dashboard/dt_summary", get(dashboard::design_team_summary))
        .route("/api/users", get(dashboard::users))
        .route("/api/groups", get(dashboard::groups))
        .route("/api/user-activity-sites", get(dashboard::user_activity_sites))
        .route("/api/activity-types", get(dashboard::activity_types))
        .route("/api/site-ids", get(dashboard::site_ids))
        .route("/api/user-tasks", get(dashboard::user_tasks))
        .route("/api/tasks", get(tasks::list_tasks))
        .route("/api/tasks/{id}", get(tasks::get_task))
        .route(
            "/api/tasks/{id}/form",
            get(tasks::get_task_form).post(tasks::submit_task_form),
        )
        .route("/api/tasks/{id}/claim", post(tasks::claim_task))
        .route("/api/process-definitions", get(process::list_definitions))
        .route(
            "/api/process-definitions/{id}/start",
            get(process::get_start_form).post(process::start_instance),
        )
        .route("/api/content/{id}", get(content::download_content))
        .route("/api/content/{id}/stream", get(content::stream_content))
        .route("/api/content/{id}/view", get(content::view_content))
        .route("/api/bulk/upload/validate", post(bulk::validate))
        .route("/api/bulk/upload/start", post(bulk::start))
        .route("/api/bulk/delete", post(bulk::delete))
        .route("/api/export", post(bulk::export))
        .route("/api/process-data/filters", get(bulk::process_data_filters))
        .route("/api/process-data", get(bulk::process_data_rows))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.config.server.port))
        .with_state(state);

    public_routes
        .merge(authed_routes)
        .layer(TraceLayer::new_for_http())
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'; frame-ancestors 'none'"),
    );
    response
}
