use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::sheet::{Sheet, SheetRow};
use crate::core::config::BulkConfig;
use crate::core::engine::{EngineClient, Lookup, Variable};
use crate::core::forms::FormModel;

pub const JOB_ID_COLUMN: &str = "qacajobid";

/// Required fields and allowed dropdown values of the bulk form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRules {
    pub required: Vec<String>,
    /// Field id → lower-cased option names.
    pub dropdowns: IndexMap<String, BTreeSet<String>>,
}

impl FieldRules {
    pub fn from_model(model: &FormModel) -> Self {
        let mut rules = FieldRules::default();
        for field in model.flatten() {
            let Some(id) = field.id.as_deref() else {
                continue;
            };
            if field.required && !rules.required.iter().any(|r| r == id) {
                rules.required.push(id.to_string());
            }
            if field.class_name.as_deref() == Some("OptionFormField") {
                let allowed = field
                    .options
                    .iter()
                    .flatten()
                    .filter_map(|o| o.name.as_deref())
                    .map(|n| n.trim().to_lowercase())
                    .filter(|n| !n.is_empty())
                    .collect();
                rules.dropdowns.insert(id.to_string(), allowed);
            }
        }
        rules
    }

    /// Problems with one row; empty when the row is acceptable.
    pub fn check(&self, row: &SheetRow) -> Vec<String> {
        let cell = |id: &str| {
            row.get(&id.to_lowercase())
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let mut errors = Vec::new();
        for id in &self.required {
            if cell(id).is_none() {
                errors.push(format!("Missing required field: {}", id));
            }
        }
        for (id, allowed) in &self.dropdowns {
            if let Some(value) = cell(id)
                && !allowed.contains(&value.to_lowercase())
            {
                errors.push(format!("Invalid value '{}' for {}", value, id));
            }
        }
        errors
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub qacajobid: String,
    pub errors: Vec<String>,
}

/// Result of checking an upload before any process is started.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The file as a whole is unusable.
    Rejected(String),
    Invalid(Vec<RowError>),
    Valid(Vec<SheetRow>),
}

impl Validation {
    pub fn to_json(&self) -> Value {
        match self {
            Validation::Rejected(error) => json!({ "valid": false, "error": error }),
            Validation::Invalid(errors) => json!({ "valid": false, "errors": errors }),
            Validation::Valid(rows) => json!({ "valid": true, "rows": rows }),
        }
    }
}

/// Checks file shape, then every row against `rules`. Row numbers are
/// spreadsheet rows: the header is row 1.
pub fn check_sheet(sheet: &Sheet, rules: &FieldRules, max_rows: usize) -> Validation {
    if let Some(rejection) = check_shape(sheet, max_rows) {
        return rejection;
    }
    let mut errors = Vec::new();
    let mut valid = Vec::new();
    for (idx, row) in sheet.rows.iter().enumerate() {
        let problems = rules.check(row);
        if problems.is_empty() {
            valid.push(
                row.iter()
                    .filter(|(_, v)| !v.trim().is_empty())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );
        } else {
            errors.push(RowError {
                row: idx + 2,
                qacajobid: row
                    .get(JOB_ID_COLUMN)
                    .filter(|v| !v.is_empty())
                    .cloned()
                    .unwrap_or_else(|| "N/A".to_string()),
                errors: problems,
            });
        }
    }
    if errors.is_empty() {
        Validation::Valid(valid)
    } else {
        Validation::Invalid(errors)
    }
}

fn check_shape(sheet: &Sheet, max_rows: usize) -> Option<Validation> {
    if sheet.is_empty() {
        return Some(Validation::Rejected("Uploaded file is empty".into()));
    }
    if sheet.rows.len() > max_rows {
        return Some(Validation::Rejected(format!("Maximum {} rows allowed", max_rows)));
    }
    if !sheet.has_column(JOB_ID_COLUMN) {
        return Some(Validation::Rejected(format!(
            "Missing required column: {}",
            JOB_ID_COLUMN
        )));
    }
    None
}

/// Parses the upload and validates it against the bulk form definition.
pub async fn validate_upload(engine: &EngineClient, config: &BulkConfig, data: &[u8]) -> Validation {
    let sheet = match Sheet::parse(data) {
        Ok(sheet) => sheet,
        Err(e) => {
            warn!("Unreadable bulk upload: {:#}", e);
            return Validation::Rejected("Invalid CSV file format".into());
        }
    };
    if let Some(rejection) = check_shape(&sheet, config.max_rows) {
        return rejection;
    }

    let Some(definition_id) = config.form_definition_id.as_deref() else {
        return Validation::Rejected(
            "Could not fetch form definition: BULK_FORM_DEFINITION_ID is not set".into(),
        );
    };
    let model = match engine.form_model(definition_id).await {
        Lookup::Found(model) => model,
        Lookup::NotFound => {
            return Validation::Rejected(format!(
                "Could not fetch form definition: {} not found",
                definition_id
            ));
        }
        Lookup::Failed(e) => {
            error!("Bulk form model fetch failed: {}", e);
            return Validation::Rejected(format!("Could not fetch form definition: {}", e));
        }
    };

    let validation = check_sheet(&sheet, &FieldRules::from_model(&model), config.max_rows);
    if let Validation::Invalid(errors) = &validation {
        info!("Bulk upload rejected with {} invalid rows", errors.len());
    }
    validation
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StartReport {
    pub started: usize,
    pub failed: usize,
    pub success_log: Vec<String>,
    pub fail_log: Vec<StartFailure>,
}

/// Starts one process per row, at most `max_parallel` at a time. Each row
/// succeeds or fails on its own.
pub async fn start_rows(engine: &EngineClient, config: &BulkConfig, rows: Vec<SheetRow>) -> StartReport {
    let permits = Arc::new(Semaphore::new(config.max_parallel.max(1)));
    let mut set = JoinSet::new();

    for row in rows {
        let engine = engine.clone();
        let key = config.process_key.clone();
        let permits = permits.clone();
        set.spawn(async move {
            let job_id = row
                .get(JOB_ID_COLUMN)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(e) => return (job_id, Err(e.to_string())),
            };
            let variables = row.into_iter().map(|(k, v)| Variable::new(k, v)).collect();
            let result = engine
                .start_process_by_key(&key, variables)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &result {
                error!("Failed to start process for {}: {}", job_id, e);
            }
            (job_id, result)
        });
    }

    let mut report = StartReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((job_id, Ok(_))) => report.success_log.push(job_id),
            Ok((job_id, Err(error))) => report.fail_log.push(StartFailure { id: job_id, error }),
            Err(e) => report.fail_log.push(StartFailure {
                id: "Unknown".into(),
                error: e.to_string(),
            }),
        }
    }
    report.started = report.success_log.len();
    report.failed = report.fail_log.len();
    info!(
        "Bulk start finished: {} started, {} failed",
        report.started, report.failed
    );
    report
}
