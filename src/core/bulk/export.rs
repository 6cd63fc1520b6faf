use anyhow::Result;
use indexmap::IndexMap;
use tracing::info;

use super::sheet::write_csv;
use crate::core::engine::EngineClient;
use crate::core::history::HistoryReader;
use crate::core::history::export::{ExportRow, export_headers};

pub const EXPORT_FILE_NAME: &str = "flowable_export.csv";
pub const DEFAULT_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    NoInstances,
    NoData,
    Csv(Vec<u8>),
}

/// Builds the process report for instances started inside the window.
/// Dates are passed to the engine as given.
pub async fn export_csv(
    engine: &EngineClient,
    history: &HistoryReader,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<ExportOutcome> {
    let ids = engine.historic_process_ids(start_date, end_date).await?;
    if ids.is_empty() {
        return Ok(ExportOutcome::NoInstances);
    }
    let rows = history.export_rows(&ids).await?;
    if rows.is_empty() {
        return Ok(ExportOutcome::NoData);
    }
    info!("Exporting {} process rows", rows.len());
    Ok(ExportOutcome::Csv(write_csv(&export_headers(), &rows)?))
}

/// One page of report rows for instances matching every filter.
pub async fn process_data(
    history: &HistoryReader,
    filters: &IndexMap<String, String>,
    limit: usize,
    offset: usize,
) -> Result<Vec<ExportRow>> {
    let ids = history.instance_ids_matching(filters).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = history.export_rows(&ids).await?;
    Ok(rows.into_iter().skip(offset).take(limit).collect())
}
