use std::time::Duration;

use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Json;
use indexmap::IndexMap;
use serde_json::{Value, json};

use super::*;
use crate::core::config::BulkConfig;
use crate::core::engine::tests::{Calls, spawn_engine};
use crate::core::history::tests::HistoryFixture;

fn bulk_form() -> Value {
    json!({
        "fields": [
            {"id": "qacajobid", "name": "Job", "type": "text", "required": true},
            {"id": "Circle", "name": "Circle", "type": "dropdown", "fieldType": "OptionFormField",
             "options": [{"name": "RJ"}, {"name": "DL"}]},
        ]
    })
}

fn config() -> BulkConfig {
    BulkConfig {
        form_definition_id: Some("bulk-form".into()),
        delete_delay_ms: 0,
        max_parallel: 2,
        ..Default::default()
    }
}

#[tokio::test]
async fn upload_is_checked_against_the_live_form() {
    let router = Router::new().route(
        "/form-api/form-repository/form-definitions/{id}/model",
        get(|Path(id): Path<String>| async move {
            assert_eq!(id, "bulk-form");
            Json(bulk_form())
        }),
    );
    let engine = spawn_engine(router).await;

    let valid = validate_upload(&engine, &config(), b"qacajobid,circle\nQ-1,rj\n").await;
    assert!(matches!(&valid, Validation::Valid(rows) if rows.len() == 1));

    let invalid = validate_upload(&engine, &config(), b"qacajobid,circle\nQ-1,Goa\n").await;
    let json = invalid.to_json();
    assert_eq!(json["valid"], false);
    assert_eq!(json["errors"][0]["row"], 2);
    assert_eq!(json["errors"][0]["errors"][0], "Invalid value 'Goa' for Circle");
}

#[tokio::test]
async fn upload_without_form_definition_is_rejected() {
    let engine = spawn_engine(Router::new()).await;
    let config = BulkConfig {
        form_definition_id: None,
        ..config()
    };
    let Validation::Rejected(error) = validate_upload(&engine, &config, b"qacajobid\nQ-1\n").await
    else {
        panic!("expected rejection");
    };
    assert!(error.starts_with("Could not fetch form definition"));

    let Validation::Rejected(error) = validate_upload(&engine, &config, b"qacajobid\n").await else {
        panic!("expected rejection");
    };
    assert_eq!(error, "Uploaded file is empty");
}

#[tokio::test]
async fn bulk_start_reports_each_row() {
    let calls = Calls::default();
    let seen = calls.clone();
    let router = Router::new().route(
        "/process-api/runtime/process-instances",
        post(move |Json(body): Json<Value>| async move {
            seen.push(format!("START {}", body));
            let job = body["variables"][0]["value"].as_str().unwrap_or_default().to_string();
            if job == "Q-bad" {
                return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad variables"})));
            }
            (StatusCode::CREATED, Json(json!({"id": format!("p-{}", job)})))
        }),
    );
    let engine = spawn_engine(router).await;

    let sheet = Sheet::parse(b"qacajobid,circle\nQ-1,RJ\nQ-bad,DL\nQ-3,RJ\n").unwrap();
    let report = start_rows(&engine, &config(), sheet.rows).await;

    assert_eq!(report.started, 2);
    assert_eq!(report.failed, 1);
    let mut started = report.success_log.clone();
    started.sort();
    assert_eq!(started, vec!["Q-1", "Q-3"]);
    assert_eq!(report.fail_log[0].id, "Q-bad");
    assert_eq!(report.fail_log[0].error, "bad variables");
    assert_eq!(calls.all().len(), 3);
}

#[tokio::test]
async fn empty_bulk_start_touches_nothing() {
    let engine = spawn_engine(Router::new()).await;
    let report = start_rows(&engine, &config(), Vec::new()).await;
    assert_eq!(report, StartReport::default());
}

#[tokio::test]
async fn bulk_delete_counts_failures() {
    let router = Router::new()
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
        );
    let engine = spawn_engine(router).await;

    let report = run_bulk_delete(
        &engine,
        vec!["p1".into(), "ghost".into()],
        Duration::from_millis(1),
    )
    .await;
    assert_eq!(report.total, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.results[0].status, "DELETED_RUNTIME");
    let failed = serde_json::to_value(&report.results[1]).unwrap();
    assert_eq!(
        failed,
        json!({"process_instance_id": "ghost", "status": "FAILED", "reason": "NOT_FOUND"})
    );
}

fn history_router(ids: Value) -> Router {
    Router::new().route(
        "/process-api/query/historic-process-instances",
        post(move |Json(body): Json<Value>| {
            let ids = ids.clone();
            async move {
                let data = if body["start"] == 0 { ids } else { json!([]) };
                Json(json!({ "data": data }))
            }
        }),
    )
}

#[tokio::test]
async fn export_writes_report_csv() {
    let fx = HistoryFixture::new();
    fx.process("p1", "2025-01-10 09:00:00", None, Some("alice"));
    fx.text_var("p1", "qacajobid", "Q-1");
    fx.text_var("p1", "initiator", "alice");
    let engine = spawn_engine(history_router(json!([{"id": "p1"}]))).await;

    let ExportOutcome::Csv(bytes) = export_csv(&engine, &fx.reader, Some("2025-01-01"), None)
        .await
        .unwrap()
    else {
        panic!("expected csv");
    };
    let text = String::from_utf8(bytes).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Process Instance ID,Start Date,End Date,Status,Circle Head Name,QACA Job ID"));
    assert!(lines.next().unwrap().starts_with("p1,2025-01-10,N/A,Pending,alice,Q-1,"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn export_distinguishes_no_instances_from_no_data() {
    let fx = HistoryFixture::new();
    let engine = spawn_engine(history_router(json!([]))).await;
    assert_eq!(
        export_csv(&engine, &fx.reader, None, None).await.unwrap(),
        ExportOutcome::NoInstances
    );

    let engine = spawn_engine(history_router(json!([{"id": "gone"}]))).await;
    assert_eq!(
        export_csv(&engine, &fx.reader, None, None).await.unwrap(),
        ExportOutcome::NoData
    );
}

#[tokio::test]
async fn process_data_pages_matching_rows() {
    let fx = HistoryFixture::new();
    for (id, start) in [("p1", "2025-01-10 09:00:00"), ("p2", "2025-01-11 09:00:00")] {
        fx.process(id, start, None, None);
        fx.text_var(id, "circle", "RJ");
    }
    fx.process("p3", "2025-01-12 09:00:00", None, None);
    fx.text_var("p3", "circle", "DL");

    let mut filters = IndexMap::new();
    filters.insert("circle".to_string(), "RJ".to_string());

    let rows = process_data(&fx.reader, &filters, 1, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Process Instance ID"], "p2");

    let rows = process_data(&fx.reader, &filters, 10, 1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Process Instance ID"], "p1");

    filters.insert("circle".to_string(), "KA".to_string());
    assert!(process_data(&fx.reader, &filters, 10, 0).await.unwrap().is_empty());
}
