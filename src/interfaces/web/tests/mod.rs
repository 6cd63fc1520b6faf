use std::sync::Arc;

use axum::body::Body;
use axum::extract::Path;
use axum::http::{Method, Request, StatusCode, header};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use super::AppState;
use super::router::build_api_router;
use crate::core::config::{AppConfig, BulkConfig};
use crate::core::engine::tests::{Calls, json_body, spawn_engine};
use crate::core::history::tests::HistoryFixture;
use crate::core::tasks::TaskService;

// base64 of `user:pw`
const ALICE: &str = "Basic YWxpY2U6cHc=";
const BOB: &str = "Basic Ym9iOnB3";
const CAROL: &str = "Basic Y2Fyb2w6cHc=";
const ALICE_WRONG: &str = "Basic YWxpY2U6d3Jvbmc=";

const BOUNDARY: &str = "qedboundary";

fn engine_router(calls: Calls) -> Router {
    let (claim, submit) = (calls.clone(), calls.clone());
    Router::new()
        .route(
            "/process-api/runtime/tasks/{id}/form",
            get(|| async {
                Json(json!({
                    "fields": [
                        {"id": "remarks", "name": "Remarks", "type": "multi-line-text"},
                        {"id": "approved", "name": "Approved", "type": "boolean"},
                    ],
                    "outcomes": [],
                }))
            }),
        )
        .route(
            "/process-api/runtime/tasks/{id}",
            post(move |Path(id): Path<String>, Json(body): Json<Value>| async move {
                claim.push(format!("CLAIM {} {}", id, body));
                StatusCode::OK
            }),
        )
        .route(
            "/process-api/form/form-data",
            post(move |Json(body): Json<Value>| async move {
                submit.push(format!("SUBMIT {}", body));
                StatusCode::OK
            }),
        )
        .route(
            "/content-api/content-service/content-items/{id}",
            get(|Path(id): Path<String>| async move {
                Json(json!({"id": id, "name": "plan.pdf", "mimeType": "application/pdf"}))
            }),
        )
        .route(
            "/content-api/content-service/content-items/{id}/data",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "application/pdf"),
                        (header::CONTENT_DISPOSITION, "attachment; filename=plan.pdf"),
                    ],
                    "%PDF-1.4",
                )
            }),
        )
        .route(
            "/process-api/runtime/process-instances/{id}",
            delete(|Path(id): Path<String>| async move {
                if id == "p1" {
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::NOT_FOUND
                }
            }),
        )
        .route(
            "/process-api/history/historic-process-instances/{id}",
            delete(|| async { StatusCode::NOT_FOUND }),
        )
        .route(
            "/process-api/query/historic-process-instances",
            post(|Json(body): Json<Value>| async move {
                let data = if body["start"] == 0 { json!([{"id": "p1"}]) } else { json!([]) };
                Json(json!({ "data": data }))
            }),
        )
}

struct Setup {
    _fx: HistoryFixture,
    app: Router,
    calls: Calls,
}

async fn setup() -> Setup {
    let fx = HistoryFixture::new();
    fx.user("alice", "pw", &["surveyors"]);
    fx.user("bob", "pw", &["designers"]);
    fx.user("carol", "pw", &["designcoordinator"]);
    fx.process("p1", "2025-01-10 09:00:00", None, Some("alice"));
    fx.task("t1", "Site Survey", "p1", Some("alice"), None);
    fx.task("t2", "Design Review", "p1", None, None);
    fx.candidate_group("t2", "designers");
    fx.text_var("p1", "qacajobid", "Q-1");
    fx.text_var("p1", "circle", "RJ");

    let calls = Calls::default();
    let engine = spawn_engine(engine_router(calls.clone())).await;
    let config = Arc::new(AppConfig {
        bulk: BulkConfig {
            delete_delay_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    });
    let history = fx.reader.clone();
    let tasks = TaskService::new(engine.clone(), history.clone(), Arc::new(config.catalog.clone()));
    let app = build_api_router(AppState {
        config,
        engine,
        history,
        tasks,
    });
    Setup { _fx: fx, app, calls }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

async fn json_request(
    app: &Router,
    method: Method,
    path: &str,
    auth: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };
    let req = Request::builder()
        .method(method)
        .uri(path)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap();
    let (status, _, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
}

/// A multipart body from `(name, file_name, content)` parts.
fn multipart(parts: &[(&str, Option<&str>, &str)]) -> Body {
    let mut body = String::new();
    for (name, file_name, content) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file_name {
            Some(file) => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\nContent-Type: text/csv\r\n\r\n"
            )),
            None => body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            )),
        }
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Body::from(body)
}

fn multipart_request(path: &str, auth: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::AUTHORIZATION, auth)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart(parts))
        .unwrap()
}

#[tokio::test]
async fn health_is_public_and_hardened() {
    let s = setup().await;
    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, headers, _) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn authed_routes_require_valid_credentials() {
    let s = setup().await;
    let req = Request::builder().uri("/api/me").body(Body::empty()).unwrap();
    let (status, headers, _) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");

    let (status, _) = json_request(&s.app, Method::GET, "/api/me", ALICE_WRONG, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = json_request(&s.app, Method::GET, "/api/me", ALICE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["id"], "alice");
    assert_eq!(json["user"]["groups"], json!(["surveyors"]));
    assert_eq!(json["display_name"], "Test User");
}

#[tokio::test]
async fn task_detail_hides_other_users_tasks() {
    let s = setup().await;
    let (status, json) = json_request(&s.app, Method::GET, "/api/tasks/t1", ALICE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["task"]["is_assignee"], true);

    let (status, json) = json_request(&s.app, Method::GET, "/api/tasks/t1", BOB, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Task not found or not assigned to you.");
}

#[tokio::test]
async fn task_list_applies_filters() {
    let s = setup().await;
    let (status, json) = json_request(&s.app, Method::GET, "/api/tasks", BOB, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(json["tasks"][0]["id"], "t2");

    let (_, json) =
        json_request(&s.app, Method::GET, "/api/tasks?status=completed", BOB, None).await;
    assert!(json["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn candidate_claims_and_assignee_cannot() {
    let s = setup().await;
    let (status, json) =
        json_request(&s.app, Method::POST, "/api/tasks/t2/claim", BOB, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let recorded = s.calls.all();
    assert_eq!(json_body(&recorded[0])["assignee"], "bob");

    let (status, _) = json_request(&s.app, Method::POST, "/api/tasks/t1/claim", ALICE, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn form_page_and_multipart_submit() {
    let s = setup().await;
    let (status, json) = json_request(&s.app, Method::GET, "/api/tasks/t1/form", ALICE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["engine_link"].as_str().unwrap().ends_with("/task-app/#/task/t1"));
    assert_eq!(json["form"]["fields"].as_array().unwrap().len(), 2);

    let req = multipart_request(
        "/api/tasks/t1/form",
        ALICE,
        &[("remarks", None, "looks fine"), ("approved", None, "on")],
    );
    let (status, _, bytes) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::OK);
    let page: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(page["submit_success"], true);

    let recorded = s.calls.all();
    let submitted = json_body(recorded.last().unwrap());
    assert_eq!(
        submitted["properties"],
        json!([
            {"id": "remarks", "value": "looks fine"},
            {"id": "approved", "value": "true"},
        ])
    );
}

#[tokio::test]
async fn content_is_proxied_with_original_headers() {
    let s = setup().await;
    let req = Request::builder()
        .uri("/api/content/c1/stream")
        .header(header::AUTHORIZATION, ALICE)
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "inline; filename=plan.pdf"
    );
    assert_eq!(body, b"%PDF-1.4");

    let (status, json) = json_request(&s.app, Method::GET, "/api/content/c1/view", ALICE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "pdf");
    assert_eq!(json["viewable"], true);
}

#[tokio::test]
async fn bulk_routes_enforce_roles() {
    let s = setup().await;
    let csv = "process_instance_id\np1\nghost\n";

    let req = multipart_request("/api/bulk/delete", ALICE, &[("file", Some("ids.csv"), csv)]);
    let (status, _, _) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = multipart_request("/api/bulk/delete", CAROL, &[("file", Some("ids.csv"), csv)]);
    let (status, _, bytes) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(report["total"], 2);
    assert_eq!(report["deleted"], 1);
    assert_eq!(report["results"][1]["reason"], "NOT_FOUND");

    let (status, _) = json_request(
        &s.app,
        Method::POST,
        "/api/bulk/upload/start",
        BOB,
        Some(json!({"rows": []})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn design_coordinator_cannot_start_bulk_upload() {
    let s = setup().await;
    let (status, json) = json_request(
        &s.app,
        Method::POST,
        "/api/bulk/upload/start",
        CAROL,
        Some(json!({"rows": []})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Access denied");

    let req = multipart_request(
        "/api/bulk/upload/validate",
        CAROL,
        &[("file", Some("rows.csv"), "qacajobid\nQ-1\n")],
    );
    let (status, _, _) = send(&s.app, req).await;
    assert_ne!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_sheet_without_id_column_is_rejected() {
    let s = setup().await;
    let req = multipart_request(
        "/api/bulk/delete",
        CAROL,
        &[("file", Some("ids.csv"), "id\np1\n")],
    );
    let (status, _, bytes) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "Missing column: process_instance_id");
}

#[tokio::test]
async fn export_returns_csv_attachment() {
    let s = setup().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/export")
        .header(header::AUTHORIZATION, CAROL)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"start_date": "2025-01-01"}"#))
        .unwrap();
    let (status, headers, body) = send(&s.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=flowable_export.csv"
    );
    let text = String::from_utf8(body).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("p1,2025-01-10,N/A,Pending,"));
}

#[tokio::test]
async fn process_data_filters_and_rows() {
    let s = setup().await;
    let (status, json) =
        json_request(&s.app, Method::GET, "/api/process-data/filters", CAROL, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filters"]["circle"], json!(["RJ"]));

    let (_, json) = json_request(
        &s.app,
        Method::GET,
        "/api/process-data?circle=RJ&limit=5",
        CAROL,
        None,
    )
    .await;
    assert_eq!(json["rows"][0]["QACA Job ID"], "Q-1");

    let (_, json) =
        json_request(&s.app, Method::GET, "/api/process-data?circle=DL", CAROL, None).await;
    assert_eq!(json["rows"], json!([]));
}

#[tokio::test]
async fn api_route_contract_has_all_expected_paths() {
    let s = setup().await;
    let paths = [
        "/api/me",
        "/api/dashboard/ch_summary",
        "/api/dashboard/dt_summary",
        "/api/users",
        "/api/groups",
        "/api/user-activity-sites",
        "/api/activity-types",
        "/api/site-ids",
        "/api/user-tasks",
        "/api/tasks",
        "/api/tasks/t1",
        "/api/tasks/t1/form",
        "/api/tasks/t1/claim",
        "/api/process-definitions",
        "/api/process-definitions/d1/start",
        "/api/content/c1",
        "/api/content/c1/stream",
        "/api/content/c1/view",
        "/api/bulk/upload/validate",
        "/api/bulk/upload/start",
        "/api/bulk/delete",
        "/api/export",
        "/api/process-data/filters",
        "/api/process-data",
    ];
    for path in paths {
        let (status, _) = json_request(&s.app, Method::PUT, path, ALICE, None).await;
        assert_eq!(
            status,
            StatusCode::METHOD_NOT_ALLOWED,
            "Route missing from router: {}",
            path
        );
    }
    let (status, _) = json_request(&s.app, Method::GET, "/api/nowhere", ALICE, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
