use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, extract::Path};
use serde_json::{Value, json};

use super::{EngineClient, EngineError, Lookup};
use crate::core::config::EngineConfig;


/// Requests seen by the mock engine, as `METHOD path body`.
#[derive(Clone, Default)]
pub(crate) struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub(crate) async fn spawn_engine(router: Router) -> EngineClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    EngineClient::new(EngineConfig {
        base_url: format!("http://{}/", addr),
        username: "svc".into(),
        password: "secret".into(),
        page_size: 2,
        ..Default::default()
    })
}

#[tokio::test]
async fn unconfigured_client_fails_without_network() {
    let client = EngineClient::new(EngineConfig::default());
    assert!(matches!(client.ping().await, Err(EngineError::NotConfigured)));
    assert!(matches!(client.task_form("t1").await, Lookup::Failed(_)));
}

#[tokio::test]
async fn requests_carry_basic_auth() {
    let router = Router::new().route(
        "/process-api/repository/process-definitions",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            // base64("svc:secret")
            if auth == "Basic c3ZjOnNlY3JldA==" {
                (StatusCode::OK, Json(json!({"data": []})))
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad auth"})))
            }
        }),
    );
    let client = spawn_engine(router).await;
    client.ping().await.unwrap();
}

#[tokio::test]
async fn error_bodies_become_messages() {
    let router = Router::new().route(
        "/process-api/runtime/tasks/{id}",
        post(|| async {
            (
                StatusCode::CONFLICT,
                Json(json!({"message": "Task t1 is already claimed", "exception": "x"})),
            )
        }),
    );
    let client = spawn_engine(router).await;
    let err = client.claim_task("t1", "bob").await.unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.to_string(), "Task t1 is already claimed");
}

#[tokio::test]
async fn content_lookup_walks_prefixes() {
    let calls = Calls::default();
    let seen = calls.clone();
    let router = Router::new()
        .route(
            "/content-api/content-service/content-items/{id}",
            get(|| async { StatusCode::NOT_FOUND }),
        )
        .route(
            "/process-api/content-service/content-items/{id}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/app-api/content-service/content-items/{id}",
            get(move |Path(id): Path<String>| async move {
                seen.push(format!("GET app {}", id));
                Json(json!({"id": id, "name": "plan.pdf", "mimeType": "application/pdf"}))
            }),
        );
    let client = spawn_engine(router).await;

    let meta = client.content_metadata("c1").await.found().unwrap();
    assert_eq!(meta.name.as_deref(), Some("plan.pdf"));
    assert_eq!(meta.mime_type.as_deref(), Some("application/pdf"));
    assert_eq!(calls.all(), vec!["GET app c1"]);
}

#[tokio::test]
async fn content_data_passes_headers_through() {
    let router = Router::new().route(
        "/content-api/content-service/content-items/{id}/data",
        get(|| async {
            (
                [
                    ("content-type", "image/png"),
                    ("content-disposition", "attachment; filename=site.png"),
                ],
                vec![1u8, 2, 3],
            )
        }),
    );
    let client = spawn_engine(router).await;

    let download = client.content_data("c1").await.found().unwrap();
    assert_eq!(download.content_type.as_deref(), Some("image/png"));
    assert_eq!(download.disposition(true), "inline; filename=site.png");
    let body = download.response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), &[1, 2, 3]);
}

#[tokio::test]
async fn missing_content_everywhere_is_not_found() {
    let router = Router::new().route("/unused", delete(|| async { StatusCode::OK }));
    let client = spawn_engine(router).await;
    assert_eq!(client.content_metadata("c1").await.found(), None);
    assert!(matches!(client.content_data("c1").await, Lookup::NotFound));
}

#[test]
fn error_message_prefers_json_message() {
    let status = reqwest::StatusCode::BAD_REQUEST;
    assert_eq!(super::error_message(status, r#"{"message":"nope"}"#), "nope");
    assert_eq!(super::error_message(status, "plain failure"), "plain failure");
    assert_eq!(super::error_message(status, ""), "HTTP 400");
}

#[tokio::test]
async fn first_found_reports_last_failure() {
    let result: Lookup<u32> = super::first_found(
        vec!["a".into(), "b".into(), "c".into()],
        |path| async move {
            match path.as_str() {
                "a" => Lookup::Failed("a broke".into()),
                "b" => Lookup::NotFound,
                _ => Lookup::Failed("c broke".into()),
            }
        },
    )
    .await;
    assert_eq!(result, Lookup::Failed("c broke".into()));

    let hit: Lookup<u32> = super::first_found(vec!["a".into(), "b".into()], |path| async move {
        if path == "b" { Lookup::Found(2) } else { Lookup::NotFound }
    })
    .await;
    assert_eq!(hit, Lookup::Found(2));
}

pub(crate) fn json_body(entry: &str) -> Value {
    let start = entry.find(['{', '[']).unwrap();
    serde_json::from_str(&entry[start..]).unwrap()
}
