use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::model::{FieldType, FormModel};
use super::value::FieldValue;

/// Strips case and the `_`, `-` and space separators from a key.
pub fn fuzzy_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect()
}

/// Variable name to value, insertion ordered, case preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValueMap {
    entries: IndexMap<String, FieldValue>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.entries.iter()
    }

    /// Later values win, except that a blank never replaces a non-blank value.
    pub fn overlay<I, K>(&mut self, source: I)
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        for (key, value) in source {
            let key = key.into();
            match self.entries.get(&key) {
                Some(existing) if value.is_blank() && !existing.is_blank() => {}
                _ => {
                    self.entries.insert(key, value);
                }
            }
        }
    }

    /// Only fills keys that are absent or currently blank.
    pub fn fill_gaps<I, K>(&mut self, source: I)
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        for (key, value) in source {
            let key = key.into();
            let is_gap = self.entries.get(&key).is_none_or(|v| v.is_blank());
            if is_gap && (!value.is_blank() || !self.entries.contains_key(&key)) {
                self.entries.insert(key, value);
            }
        }
    }

    /// Merges the values of a flat form snapshot. Date fields override, other
    /// fields only fill gaps, blanks and generic placeholders are skipped.
    pub fn merge_snapshot(&mut self, snapshot: &FormModel) {
        for field in snapshot.flatten() {
            let Some(id) = field.id.as_deref() else {
                continue;
            };
            if field.value.is_blank() || field.value.is_generic() {
                continue;
            }
            if field.field_type == FieldType::Date {
                self.entries.insert(id.to_string(), field.value.clone());
            } else {
                self.fill_gaps([(id, field.value.clone())]);
            }
        }
    }

    pub fn resolve(self) -> ResolvedValues {
        ResolvedValues::new(self)
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.entries.insert(k.into(), v);
        }
        map
    }
}

/// One resolved history variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedValue {
    pub name: String,
    pub value: FieldValue,
}

/// Everything fetched for one task, before merging.
#[derive(Debug, Clone, Default)]
pub struct ValueSources {
    /// Historic form-instance snapshots, oldest submission first.
    pub historic_forms: Vec<IndexMap<String, FieldValue>>,
    pub history_variables: Vec<NamedValue>,
    pub task_variables: IndexMap<String, FieldValue>,
    pub process_variables: IndexMap<String, FieldValue>,
    pub historic_variables: IndexMap<String, FieldValue>,
    pub form_snapshot: Option<FormModel>,
}

impl ValueSources {
    /// Merges the sources lowest priority first.
    pub fn aggregate(&self) -> ValueMap {
        let mut map = ValueMap::new();

        for snapshot in &self.historic_forms {
            map.overlay(
                snapshot
                    .iter()
                    .filter(|(_, v)| !v.is_blank())
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        map.overlay(
            self.history_variables
                .iter()
                .map(|nv| (nv.name.clone(), nv.value.clone())),
        );
        map.overlay(self.task_variables.clone());
        map.fill_gaps(self.process_variables.clone());
        map.fill_gaps(self.historic_variables.clone());
        if let Some(snapshot) = &self.form_snapshot {
            map.merge_snapshot(snapshot);
        }

        debug!(keys = map.len(), "Aggregated task values");
        map
    }
}

/// A merged [`ValueMap`] with its case-folded and separator-stripped indices.
#[derive(Debug, Clone, Default)]
pub struct ResolvedValues {
    exact: ValueMap,
    lower: IndexMap<String, FieldValue>,
    fuzzy: IndexMap<String, FieldValue>,
}

impl ResolvedValues {
    pub fn new(exact: ValueMap) -> Self {
        let mut lower = IndexMap::new();
        let mut fuzzy = IndexMap::new();
        for (k, v) in exact.iter() {
            lower.insert(k.to_lowercase(), v.clone());
            fuzzy.insert(fuzzy_key(k), v.clone());
        }
        Self { exact, lower, fuzzy }
    }

    pub fn map(&self) -> &ValueMap {
        &self.exact
    }

    pub fn exact(&self, key: &str) -> Option<&FieldValue> {
        self.exact.get(key)
    }

    pub fn lower(&self, key: &str) -> Option<&FieldValue> {
        self.lower.get(&key.to_lowercase())
    }

    pub fn fuzzy(&self, key: &str) -> Option<&FieldValue> {
        self.fuzzy.get(&fuzzy_key(key))
    }

    /// Exact, then case-insensitive, then separator-stripped.
    pub fn lookup(&self, key: &str) -> Option<&FieldValue> {
        self.exact(key)
            .or_else(|| self.lower(key))
            .or_else(|| self.fuzzy(key))
    }

    /// First fuzzy key longer than three characters that contains, or is
    /// contained in, the fuzzy form of `key`.
    pub fn containing(&self, key: &str) -> Option<(&str, &FieldValue)> {
        let needle = fuzzy_key(key);
        if needle.is_empty() {
            return None;
        }
        self.fuzzy
            .iter()
            .find(|(k, _)| k.len() > 3 && (needle.contains(k.as_str()) || k.contains(&needle)))
            .map(|(k, v)| (k.as_str(), v))
    }
}
