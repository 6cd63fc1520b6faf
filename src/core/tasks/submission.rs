use indexmap::IndexMap;

use crate::core::engine::content::Upload;
use crate::core::engine::{FormProperty, Variable};
use crate::core::forms::{FieldType, FormField, FormModel};

/// Prefix of multipart parts that carry a file for a form field.
pub const UPLOAD_PREFIX: &str = "upload_";

/// A decoded form post: plain values, the chosen outcome and any files.
#[derive(Debug, Clone, Default)]
pub struct SubmittedForm {
    pub values: IndexMap<String, String>,
    pub outcome: Option<String>,
    pub uploads: Vec<Upload>,
}

impl SubmittedForm {
    /// Routes one multipart part: `upload_<fieldId>` parts with a file name
    /// become uploads, `outcome` is kept aside, everything else is a value.
    pub fn add_part(
        &mut self,
        name: &str,
        file_name: Option<String>,
        content_type: Option<String>,
        data: bytes::Bytes,
    ) {
        if let Some(field_id) = name.strip_prefix(UPLOAD_PREFIX)
            && let Some(file_name) = file_name.filter(|f| !f.is_empty())
        {
            self.uploads.push(Upload {
                field_id: field_id.to_string(),
                file_name,
                content_type,
                data,
            });
            return;
        }
        let text = String::from_utf8_lossy(&data).into_owned();
        if name == "outcome" {
            self.outcome = Some(text).filter(|o| !o.trim().is_empty());
        } else {
            self.values.insert(name.to_string(), text);
        }
    }
}

fn checkbox_value(raw: Option<&String>) -> &'static str {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if !v.is_empty() && v != "false" => "true",
        _ => "false",
    }
}

fn submittable(fields: Vec<&FormField>, values: &IndexMap<String, String>) -> Vec<FormProperty> {
    fields
        .into_iter()
        .filter(|f| !f.read_only)
        .filter_map(|field| {
            let id = field.id.as_deref().filter(|id| !id.is_empty())?;
            let value = if field.field_type == FieldType::Boolean {
                checkbox_value(values.get(id)).to_string()
            } else {
                values.get(id).cloned().unwrap_or_default()
            };
            Some(FormProperty {
                id: id.to_string(),
                value,
            })
        })
        .collect()
}

/// Properties for a task submission. The flat form lists every field the
/// engine expects; the layout is only walked when there is no flat form.
pub fn task_properties(
    flat: Option<&FormModel>,
    layout: Option<&FormModel>,
    values: &IndexMap<String, String>,
) -> Vec<FormProperty> {
    let fields = match flat.filter(|f| !f.is_empty()) {
        Some(flat) => flat.flatten(),
        None => layout.map(FormModel::flatten).unwrap_or_default(),
    };
    submittable(fields, values)
}

/// Start-form values as process variables.
pub fn start_variables(form: Option<&FormModel>, values: &IndexMap<String, String>) -> Vec<Variable> {
    let fields = form.map(FormModel::flatten).unwrap_or_default();
    submittable(fields, values)
        .into_iter()
        .map(|p| Variable::new(p.id, p.value))
        .collect()
}
