use tracing::debug;

use super::blob::decode_legacy_date;
use crate::core::forms::FieldValue;
use crate::core::forms::dates::{CANONICAL_FORMAT, format_epoch_millis};

/// One `ACT_HI_VARINST` row joined with its byte array.
#[derive(Debug, Clone, Default)]
pub struct VariableRow {
    pub name: String,
    pub var_type: Option<String>,
    pub text: Option<String>,
    pub long: Option<i64>,
    pub double: Option<f64>,
    pub bytes: Option<Vec<u8>>,
    pub task_id: Option<String>,
}

impl VariableRow {
    fn is_date_type(&self) -> bool {
        matches!(self.var_type.as_deref(), Some("date" | "jodadate"))
    }

    fn is_serializable(&self) -> bool {
        self.var_type.as_deref() == Some("serializable")
    }
}

/// Picks the value column for a polymorphic variable row.
///
/// Date types read their millisecond column as `YYYY-MM-DD`, serialized legacy
/// dates are decoded from the blob, and everything else prefers text, then
/// long, then double. An undecodable serialized blob yields `None` so it
/// cannot mask a value from another source.
pub fn resolve_variable(row: &VariableRow) -> Option<FieldValue> {
    let mut value = None;

    if row.is_date_type()
        && let Some(ms) = row.long
    {
        value = Some(
            format_epoch_millis(ms, CANONICAL_FORMAT)
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Int(ms)),
        );
    } else if row.is_serializable()
        && let Some(bytes) = row.bytes.as_deref().filter(|b| !b.is_empty())
    {
        match decode_legacy_date(bytes) {
            Some(date) => value = Some(FieldValue::Text(date.format(CANONICAL_FORMAT).to_string())),
            None => debug!(variable = %row.name, "Undecodable serialized variable"),
        }
    }

    if value.is_none() {
        value = row
            .text
            .clone()
            .map(FieldValue::Text)
            .or(row.long.map(FieldValue::Int))
            .or(row.double.map(FieldValue::Float));
    }

    if value.is_none() && row.is_serializable() && row.bytes.as_ref().is_some_and(|b| !b.is_empty()) {
        return None;
    }
    Some(value.unwrap_or(FieldValue::Null))
}
