//! Spreadsheet-driven administration: bulk process start, bulk delete and
//! the process report.

pub mod delete;
pub mod export;
pub mod sheet;
pub mod upload;

pub use delete::{DeleteReport, delete_ids, run_bulk_delete};
pub use export::{ExportOutcome, export_csv, process_data};
pub use sheet::{Sheet, SheetRow};
pub use upload::{StartReport, Validation, start_rows, validate_upload};

#[cfg(test)]
mod tests;
