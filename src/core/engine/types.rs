use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::forms::FieldValue;

/// `{ "data": [...] }` envelope used by the engine's list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
    pub id: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub start_form_defined: bool,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Runtime task as returned by `/runtime/tasks`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTask {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub form_key: Option<String>,
    #[serde(default)]
    pub process_instance_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdOnly {
    #[serde(default)]
    pub id: Option<String>,
}

/// One submitted form value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormProperty {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub task_id: String,
    pub properties: Vec<FormProperty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: serde_json::Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Turns a variable listing into a name → value map. Items may carry the
/// pair directly or nested under `variable` (historic instances).
pub fn variables_from_json(items: &[serde_json::Value]) -> IndexMap<String, FieldValue> {
    let mut out = IndexMap::new();
    for item in items {
        let source = item.get("variable").unwrap_or(item);
        let Some(name) = source.get("name").and_then(|n| n.as_str()) else {
            continue;
        };
        let value = source.get("value").cloned().unwrap_or_default();
        out.insert(name.to_string(), FieldValue::from(value));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMeta {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub process_instance_id: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Image,
    Text,
    Unknown,
}

impl ContentKind {
    pub fn classify(mime_type: &str) -> Self {
        if mime_type == "application/pdf" {
            ContentKind::Pdf
        } else if mime_type.starts_with("image/") {
            ContentKind::Image
        } else if mime_type.starts_with("text/") {
            ContentKind::Text
        } else {
            ContentKind::Unknown
        }
    }

    pub fn is_viewable(self) -> bool {
        !matches!(self, ContentKind::Unknown)
    }
}

/// Outcome of deleting one process instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStatus {
    DeletedRuntime,
    DeletedHistory,
    NotFound,
    RuntimeError(String),
    HistoryError(String),
    ConnectionError,
}

impl DeleteStatus {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteStatus::DeletedRuntime | DeleteStatus::DeletedHistory)
    }
}

impl std::fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteStatus::DeletedRuntime => write!(f, "DELETED_RUNTIME"),
            DeleteStatus::DeletedHistory => write!(f, "DELETED_HISTORY"),
            DeleteStatus::NotFound => write!(f, "NOT_FOUND"),
            DeleteStatus::RuntimeError(body) => write!(f, "RUNTIME_ERROR: {}", body),
            DeleteStatus::HistoryError(body) => write!(f, "HISTORY_ERROR: {}", body),
            DeleteStatus::ConnectionError => write!(f, "CONNECTION_ERROR"),
        }
    }
}
