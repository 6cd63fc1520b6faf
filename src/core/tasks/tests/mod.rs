use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, extract::Path};
use serde_json::{Value, json};

use super::{ActionDenied, SubmittedForm, TaskError, TaskListFilter, TaskService, TaskStatus};
use crate::core::engine::content::Upload;
use crate::core::engine::tests::{Calls, json_body, spawn_engine};
use crate::core::forms::{Catalog, FieldType, FieldValue, FormModel};
use crate::core::history::tests::HistoryFixture;

fn survey_form() -> Value {
    json!({
        "formDefinitionId": "fd-1",
        "fields": [
            {"id": "allotmentdate", "name": "Allotment Date", "type": "date"},
            {"id": "client", "name": "Client", "type": "text"},
            {"id": "circle", "name": "Circle", "type": "dropdown", "value": "Option 1",
             "options": [{"name": "Option 1"}]},
            {"id": "remarks", "name": "Remarks", "type": "multi-line-text"},
        ],
        "outcomes": [{"id": "submit", "name": "Submit"}],
    })
}

fn survey_layout() -> Value {
    json!({
        "rows": [
            {"cols": [{"fields": [
                {"id": "allotmentdate", "name": "Allotment Date", "type": "date"},
                {"id": "client", "name": "Client", "type": "text"},
            ]}]},
            {"cols": [{"fields": [
                {"id": "circle", "name": "Circle", "type": "dropdown"},
                {"id": "checklabel", "name": "Drawings attached", "type": "text"},
                {"id": "drawings", "name": "", "type": "boolean"},
            ]}]},
        ]
    })
}

fn engine_router(calls: Calls) -> Router {
    let form_calls = calls.clone();
    Router::new()
        .route(
            "/process-api/runtime/tasks/{id}/form",
            get(|| async { Json(survey_form()) }),
        )
        .route(
            "/form-api/form-repository/form-definitions/{id}/model",
            get(|| async { Json(survey_layout()) }),
        )
        .route(
            "/form-api/form-history/form-instances",
            get(|| async { Json(json!({"data": [{"id": "f1", "values": {"client": ""}}]})) }),
        )
        .route(
            "/process-api/runtime/tasks/{id}/variables",
            get(|| async { Json(json!([{"name": "circle", "value": "RJ"}])) }),
        )
        .route(
            "/process-api/runtime/tasks/{id}",
            post(move |Path(id): Path<String>, Json(body): Json<Value>| {
                let calls = calls.clone();
                async move {
                    calls.push(format!("CLAIM {} {}", id, body));
                    StatusCode::OK
                }
            }),
        )
        .route(
            "/process-api/form/form-data",
            post(move |Json(body): Json<Value>| async move {
                if body["properties"]
                    .as_array()
                    .is_some_and(|p| p.iter().any(|p| p["value"] == "reject me"))
                {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"message": "Remarks are not acceptable"})),
                    );
                }
                form_calls.push(format!("SUBMIT {}", body));
                (StatusCode::OK, Json(json!({})))
            }),
        )
}

struct Setup {
    fx: HistoryFixture,
    service: TaskService,
    calls: Calls,
}

async fn setup() -> Setup {
    let fx = HistoryFixture::new();
    fx.user("alice", "pw", &["surveyors"]);
    fx.user("bob", "pw", &["designers"]);
    fx.process("p1", "2025-01-10 09:00:00", None, Some("alice"));
    fx.task("t1", "Site Survey", "p1", Some("alice"), None);
    fx.task("t2", "Design Review", "p1", None, None);
    fx.candidate_group("t2", "designers");
    fx.text_var("p1", "client", "Acme");
    fx.date_var("p1", "allotmentdate", 1_736_899_200_000);

    let calls = Calls::default();
    let engine = spawn_engine(engine_router(calls.clone())).await;
    let service = TaskService::new(engine, fx.reader.clone(), Arc::new(Catalog::default()));
    Setup { fx, service, calls }
}

fn field_value(form: &FormModel, id: &str) -> FieldValue {
    form.flatten()
        .into_iter()
        .find(|f| f.id.as_deref() == Some(id))
        .map(|f| f.value.clone())
        .unwrap_or_default()
}

#[tokio::test]
async fn form_page_merges_every_source() {
    let s = setup().await;
    let page = s.service.form_page("alice", "t1").await.unwrap();
    assert!(page.engine_link.ends_with("/task-app/#/task/t1"));
    assert!(!page.submit_success);

    let form = page.form.unwrap();
    assert!(form.use_layout);
    assert_eq!(form.outcomes.len(), 1);
    assert_eq!(field_value(&form, "allotmentdate"), FieldValue::text("2025-01-15"));
    // The blank historic form value never masks the history variable.
    assert_eq!(field_value(&form, "client"), FieldValue::text("Acme"));
    // Runtime variable beats the generic placeholder from the flat form.
    assert_eq!(field_value(&form, "circle"), FieldValue::text("RJ"));

    let label = form
        .flatten()
        .into_iter()
        .find(|f| f.id.as_deref() == Some("checklabel"))
        .unwrap()
        .field_type
        .clone();
    assert_eq!(label, FieldType::Header);
}

#[tokio::test]
async fn hidden_tasks_are_not_found() {
    let s = setup().await;
    assert!(matches!(
        s.service.form_page("bob", "t1").await,
        Err(TaskError::NotFound)
    ));
    assert!(matches!(
        s.service.claim("alice", "t2").await,
        Err(TaskError::NotFound)
    ));
}

#[tokio::test]
async fn candidate_claims_through_engine() {
    let s = setup().await;
    s.service.claim("bob", "t2").await.unwrap();
    let recorded = s.calls.all();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].starts_with("CLAIM t2 "));
    assert_eq!(json_body(&recorded[0])["assignee"], "bob");
}

#[tokio::test]
async fn own_and_completed_tasks_cannot_be_claimed() {
    let s = setup().await;
    assert!(matches!(
        s.service.claim("alice", "t1").await,
        Err(TaskError::Denied(ActionDenied::AlreadyAssigned))
    ));

    s.fx.task("t3", "Closed", "p1", Some("alice"), Some("2025-01-12 10:00:00"));
    assert!(matches!(
        s.service.claim("alice", "t3").await,
        Err(TaskError::Denied(ActionDenied::Completed))
    ));
    assert!(s.calls.all().is_empty());
}

#[tokio::test]
async fn candidates_must_claim_before_submitting() {
    let s = setup().await;
    let result = s.service.submit("bob", "t2", SubmittedForm::default()).await;
    assert!(matches!(result, Err(TaskError::Denied(ActionDenied::NotAssignee))));
}

#[tokio::test]
async fn successful_submit_reloads_the_page() {
    let s = setup().await;
    let mut submitted = SubmittedForm::default();
    submitted.values.insert("remarks".into(), "all good".into());
    submitted.values.insert("circle".into(), "DL".into());
    submitted.outcome = Some("submit".into());

    let page = s.service.submit("alice", "t1", submitted).await.unwrap();
    assert!(page.submit_success);
    assert_eq!(page.submit_error, None);
    assert!(page.form.is_some());

    let recorded = s.calls.all();
    assert_eq!(recorded.len(), 1);
    let body = json_body(&recorded[0]);
    assert_eq!(body["taskId"], "t1");
    assert_eq!(body["outcome"], "submit");
    let props = body["properties"].as_array().unwrap();
    assert_eq!(props.len(), 4);
    assert!(props.contains(&json!({"id": "remarks", "value": "all good"})));
}

#[tokio::test]
async fn rejected_submit_surfaces_engine_message() {
    let s = setup().await;
    let mut submitted = SubmittedForm::default();
    submitted.values.insert("remarks".into(), "reject me".into());

    let page = s.service.submit("alice", "t1", submitted).await.unwrap();
    assert!(!page.submit_success);
    assert_eq!(page.submit_error.as_deref(), Some("Remarks are not acceptable"));
    assert_eq!(page.task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn failed_upload_blocks_submission() {
    let s = setup().await;
    let mut submitted = SubmittedForm::default();
    submitted.uploads.push(Upload {
        field_id: "photo".into(),
        file_name: "site.jpg".into(),
        content_type: Some("image/jpeg".into()),
        data: vec![1u8, 2, 3].into(),
    });

    let page = s.service.submit("alice", "t1", submitted).await.unwrap();
    let error = page.submit_error.unwrap();
    assert!(error.starts_with("Error uploading site.jpg: "));
    assert!(s.calls.all().is_empty());
}

#[tokio::test]
async fn task_list_filters_by_status_and_name() {
    let s = setup().await;
    s.fx.task("t3", "Site Survey Rework", "p1", Some("alice"), Some("2025-01-12 10:00:00"));

    let all = s.service.list("alice", &TaskListFilter::default()).await;
    assert_eq!(all.tasks.len(), 2);

    let filter = TaskListFilter {
        status: Some(TaskStatus::Completed),
        name: Some("rework".into()),
        ..Default::default()
    };
    let done = s.service.list("alice", &filter).await;
    assert_eq!(done.tasks.len(), 1);
    assert_eq!(done.summary.completed, 1);
    assert_eq!(done.summary.pending, 0);
}
