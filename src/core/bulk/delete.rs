use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::sheet::Sheet;
use crate::core::engine::EngineClient;

pub const INSTANCE_COLUMN: &str = "process_instance_id";

/// Instance ids listed in a delete sheet, blanks and `nan` cells skipped.
pub fn delete_ids(sheet: &Sheet) -> Result<Vec<String>, String> {
    if !sheet.has_column(INSTANCE_COLUMN) {
        return Err(format!("Missing column: {}", INSTANCE_COLUMN));
    }
    Ok(sheet
        .rows
        .iter()
        .filter_map(|row| row.get(INSTANCE_COLUMN))
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("nan"))
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub process_instance_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteReport {
    pub total: usize,
    pub deleted: usize,
    pub failed: usize,
    pub results: Vec<DeleteOutcome>,
}

/// Deletes each instance in order, pausing `delay` between calls so the
/// engine is not flooded.
pub async fn run_bulk_delete(engine: &EngineClient, ids: Vec<String>, delay: Duration) -> DeleteReport {
    let mut report = DeleteReport {
        total: ids.len(),
        ..Default::default()
    };
    for (idx, id) in ids.into_iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let status = engine.delete_process_instance(&id).await;
        let outcome = if status.is_deleted() {
            report.deleted += 1;
            DeleteOutcome {
                process_instance_id: id,
                status: status.to_string(),
                reason: None,
            }
        } else {
            warn!("Delete of {} failed: {}", id, status);
            report.failed += 1;
            DeleteOutcome {
                process_instance_id: id,
                status: "FAILED".into(),
                reason: Some(status.to_string()),
            }
        };
        report.results.push(outcome);
    }
    info!(
        "Bulk delete finished: {} of {} deleted",
        report.deleted, report.total
    );
    report
}
