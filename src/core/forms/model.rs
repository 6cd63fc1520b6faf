use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::value::FieldValue;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Text,
    MultiLineText,
    PlainText,
    Boolean,
    Date,
    Dropdown,
    Select,
    RadioButtons,
    Expression,
    Header,
    FormattedText,
    Container,
    Upload,
    Integer,
    Decimal,
    #[default]
    Unspecified,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::MultiLineText => "multi-line-text",
            FieldType::PlainText => "plain-text",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Dropdown => "dropdown",
            FieldType::Select => "select",
            FieldType::RadioButtons => "radio-buttons",
            FieldType::Expression => "expression",
            FieldType::Header => "header",
            FieldType::FormattedText => "formatted-text",
            FieldType::Container => "container",
            FieldType::Upload => "upload",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Unspecified => "",
            FieldType::Other(s) => s.as_str(),
        }
    }

    /// Types rendered with a selectable option list.
    pub fn is_option_bearing(&self) -> bool {
        matches!(
            self,
            FieldType::Dropdown | FieldType::Select | FieldType::RadioButtons
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::MultiLineText | FieldType::PlainText
        )
    }

    /// Non-valued display types whose label may carry the content.
    pub fn is_display(&self) -> bool {
        matches!(
            self,
            FieldType::Expression | FieldType::Header | FieldType::FormattedText
        )
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        match raw.to_lowercase().as_str() {
            "text" => FieldType::Text,
            "multi-line-text" => FieldType::MultiLineText,
            "plain-text" => FieldType::PlainText,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "dropdown" => FieldType::Dropdown,
            "select" => FieldType::Select,
            "radio-buttons" => FieldType::RadioButtons,
            "expression" => FieldType::Expression,
            "header" => FieldType::Header,
            "formatted-text" => FieldType::FormattedText,
            "container" => FieldType::Container,
            "upload" => FieldType::Upload,
            "integer" => FieldType::Integer,
            "decimal" => FieldType::Decimal,
            "" => FieldType::Unspecified,
            _ => FieldType::Other(raw),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

/// Accepts strings, numbers and booleans where the engine documents a string id.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Container children arrive as a flat list, a list of rows, or a map of rows.
fn container_fields<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FormField>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let mut out = Vec::new();
    collect_container_fields(raw.unwrap_or(serde_json::Value::Null), &mut out)
        .map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn collect_container_fields(
    raw: serde_json::Value,
    out: &mut Vec<FormField>,
) -> Result<(), serde_json::Error> {
    match raw {
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(_) => out.push(serde_json::from_value(item)?),
                    nested @ serde_json::Value::Array(_) => collect_container_fields(nested, out)?,
                    _ => {}
                }
            }
        }
        serde_json::Value::Object(map) => {
            for (_, group) in map {
                collect_container_fields(group, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldOption {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl FieldOption {
    pub fn new(label: &str) -> Self {
        Self {
            id: Some(label.to_string()),
            name: Some(label.to_string()),
            extra: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormField {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FieldOption>>,
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
    #[serde(default)]
    pub required: bool,
    /// Engine-side implementation class, e.g. `OptionFormField`.
    #[serde(rename = "fieldType", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "container_fields",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<LayoutRow>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl FormField {
    pub fn id_lower(&self) -> String {
        self.id.as_deref().unwrap_or_default().to_lowercase()
    }

    pub fn name_lower(&self) -> String {
        self.name.as_deref().unwrap_or_default().to_lowercase()
    }

    pub fn has_options(&self) -> bool {
        self.options.as_ref().is_some_and(|o| !o.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutCol {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutRow {
    #[serde(default)]
    pub cols: Vec<LayoutCol>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// A task or start form, either as a flat field list or a rows/cols layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FormModel {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<LayoutRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<serde_json::Value>,
    #[serde(
        rename = "formDefinitionId",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub form_definition_id: Option<String>,
    #[serde(default)]
    pub use_layout: bool,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl FormModel {
    /// Moves a flat field list into a single full-width column so every
    /// model renders through the same rows/cols tree.
    pub fn normalize(&mut self) {
        if self.rows.is_empty() && !self.fields.is_empty() {
            let fields = std::mem::take(&mut self.fields);
            self.rows.push(LayoutRow {
                cols: vec![LayoutCol {
                    width: Some(12),
                    fields,
                    extra: IndexMap::new(),
                }],
                extra: IndexMap::new(),
            });
        }
        self.use_layout = true;
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.rows.is_empty()
    }

    /// Calls `f` on every sibling list in the tree, parents before children.
    pub fn visit_field_lists_mut(&mut self, f: &mut dyn FnMut(&mut Vec<FormField>)) {
        visit_list(&mut self.fields, f);
        for row in &mut self.rows {
            for col in &mut row.cols {
                visit_list(&mut col.fields, f);
            }
        }
    }

    pub fn visit_fields_mut(&mut self, f: &mut dyn FnMut(&mut FormField)) {
        self.visit_field_lists_mut(&mut |list| {
            for field in list.iter_mut() {
                f(field);
            }
        });
    }

    /// Every field in document order, containers included.
    pub fn flatten(&self) -> Vec<&FormField> {
        let mut out = Vec::new();
        collect(&self.fields, &mut out);
        for row in &self.rows {
            for col in &row.cols {
                collect(&col.fields, &mut out);
            }
        }
        out
    }
}

fn visit_list(list: &mut Vec<FormField>, f: &mut dyn FnMut(&mut Vec<FormField>)) {
    if list.is_empty() {
        return;
    }
    f(list);
    for field in list.iter_mut() {
        visit_list(&mut field.fields, f);
        for row in &mut field.rows {
            for col in &mut row.cols {
                visit_list(&mut col.fields, f);
            }
        }
    }
}

fn collect<'a>(list: &'a [FormField], out: &mut Vec<&'a FormField>) {
    for field in list {
        out.push(field);
        collect(&field.fields, out);
        for row in &field.rows {
            for col in &row.cols {
                collect(&col.fields, out);
            }
        }
    }
}
