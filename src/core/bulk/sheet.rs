use anyhow::{Context, Result};
use indexmap::IndexMap;

/// One spreadsheet row keyed by lower-cased header.
pub type SheetRow = IndexMap<String, String>;

/// A CSV upload with normalized headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    /// Parses CSV bytes. Headers are trimmed and lower-cased; rows with no
    /// non-blank cell are dropped.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(data);
        let headers: Vec<String> = reader
            .headers()
            .context("Unreadable header row")?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read row {}", idx + 2))?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let row = headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), record.get(i).unwrap_or_default().to_string()))
                .collect();
            rows.push(row);
        }
        Ok(Self { headers, rows })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Writes `rows` as CSV with `headers` as the first line.
pub fn write_csv<'a, I>(headers: &[&str], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a SheetRow>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(
            headers
                .iter()
                .map(|h| row.get(*h).map(String::as_str).unwrap_or_default()),
        )?;
    }
    writer.into_inner().context("Failed to finish CSV output")
}
