//! Read-only access to the engine's relational history tables.

pub mod blob;
mod dashboard;
pub mod export;
mod identity;
mod tasks;
pub mod types;
mod variables;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

pub use types::*;
pub use variables::{VariableRow, resolve_variable};

/// Opens one read-only connection per call and releases it when the call ends.
#[derive(Debug, Clone)]
pub struct HistoryReader {
    db_path: PathBuf,
}

impl HistoryReader {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open history database {}", self.db_path.display()))
    }

    /// Runs `f` against a fresh connection on the blocking pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let reader = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = reader.open()?;
            f(&conn)
        })
        .await
        .context("History query task panicked")?
    }

    /// Confirms the database opens and carries the task history table.
    pub async fn ping(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM ACT_HI_TASKINST", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
pub(crate) mod tests;
