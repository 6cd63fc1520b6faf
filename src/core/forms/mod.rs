//! Form reconciliation: value aggregation, field population and headline cleanup.

pub mod catalog;
pub mod dates;
pub mod headlines;
pub mod model;
pub mod rules;
pub mod value;
pub mod values;

pub use catalog::Catalog;
pub use headlines::reclassify_headlines;
pub use model::{FieldOption, FieldType, FormField, FormModel, LayoutCol, LayoutRow};
pub use rules::populate;
pub use value::FieldValue;
pub use values::{NamedValue, ResolvedValues, ValueMap, ValueSources, fuzzy_key};

/// Normalizes the layout, populates every field from `sources` and runs the
/// headline pass. Returns the merged values used for population.
pub fn reconcile(model: &mut FormModel, sources: &ValueSources, catalog: &Catalog) -> ResolvedValues {
    model.normalize();
    let resolved = sources.aggregate().resolve();
    populate(model, &resolved, catalog);
    reclassify_headlines(model);
    resolved
}
