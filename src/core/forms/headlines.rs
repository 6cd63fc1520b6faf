use tracing::debug;

use super::model::{FieldType, FormField, FormModel};

const HEADLINE_PHRASES: [&str; 1] = ["reason for non-ftr"];
const PROTECTED_LABEL: &str = "time taken";

/// Turns plain text fields that only label their neighbours into headers.
///
/// A textual field becomes a header when its label is a known headline
/// phrase, or when it sits directly before a boolean and is read-only or
/// empty. Labels containing "time taken" are never touched.
pub fn reclassify_headlines(model: &mut FormModel) {
    model.visit_field_lists_mut(&mut reclassify_siblings);
}

fn reclassify_siblings(list: &mut Vec<FormField>) {
    for idx in 0..list.len() {
        let next_is_boolean = list
            .get(idx + 1)
            .is_some_and(|f| f.field_type == FieldType::Boolean);
        let field = &mut list[idx];
        if is_headline(field, next_is_boolean) {
            debug!(field = field.id.as_deref().unwrap_or("-"), "Reclassified as header");
            field.field_type = FieldType::Header;
        }
    }
}

fn is_headline(field: &FormField, next_is_boolean: bool) -> bool {
    if !field.field_type.is_textual() {
        return false;
    }
    let label = field.name_lower();
    if label.contains(PROTECTED_LABEL) {
        return false;
    }
    if HEADLINE_PHRASES.iter().any(|p| label.contains(p)) {
        return true;
    }
    next_is_boolean && (field.read_only || field.value.is_blank())
}
