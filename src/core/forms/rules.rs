//! Field population pipeline.
//!
//! Each [`Rule`] pairs a predicate with an action over a single field. The
//! pipeline runs every rule, in order, on every field of the tree. A failing
//! rule is logged and the next rule (and the next field) still runs.

use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::catalog::Catalog;
use super::dates::normalize_date_value;
use super::model::{FieldOption, FieldType, FormField, FormModel};
use super::value::{FieldValue, is_generic_label};
use super::values::ResolvedValues;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(.+?)\}").expect("placeholder pattern compiles"));

pub struct PopulateContext<'a> {
    pub values: &'a ResolvedValues,
    pub catalog: &'a Catalog,
}

pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&FormField, &PopulateContext) -> bool,
    pub apply: fn(&mut FormField, &PopulateContext) -> Result<()>,
}

pub const PIPELINE: [Rule; 6] = [
    Rule {
        name: "option_repair",
        applies: |f, _| f.field_type.is_option_bearing(),
        apply: repair_options,
    },
    Rule {
        name: "heuristic_backfill",
        applies: |f, _| f.value.is_blank() && f.id.is_some(),
        apply: heuristic_backfill,
    },
    Rule {
        name: "key_lookup",
        applies: |f, _| f.value.is_blank() && f.id.is_some(),
        apply: key_lookup,
    },
    Rule {
        name: "value_in_options",
        applies: |f, _| f.field_type.is_option_bearing() && f.has_options() && !f.value.is_blank(),
        apply: |f, _| {
            ensure_value_in_options(f);
            Ok(())
        },
    },
    Rule {
        name: "expression",
        applies: |f, _| expression_target(f).is_some(),
        apply: substitute_expressions,
    },
    Rule {
        name: "date_normalization",
        applies: |f, _| f.field_type == FieldType::Date && !f.value.is_blank(),
        apply: |f, _| {
            f.value = normalize_date_value(&f.value)?;
            Ok(())
        },
    },
];

/// Runs the pipeline over every field of `model`, mutating it in place.
pub fn populate(model: &mut FormModel, values: &ResolvedValues, catalog: &Catalog) {
    let ctx = PopulateContext { values, catalog };
    model.visit_fields_mut(&mut |field| apply_rules(field, &ctx));
}

pub fn apply_rules(field: &mut FormField, ctx: &PopulateContext) {
    for rule in &PIPELINE {
        if !(rule.applies)(field, ctx) {
            continue;
        }
        if let Err(e) = (rule.apply)(field, ctx) {
            warn!(
                rule = rule.name,
                field = field.id.as_deref().unwrap_or("-"),
                "Field rule failed: {}",
                e
            );
        }
    }
}

fn repair_options(field: &mut FormField, ctx: &PopulateContext) -> Result<()> {
    let id = field.id_lower();
    let missing = !field.has_options();

    if missing {
        for (keyword, labels) in ctx.catalog.keyword_lists() {
            if id.contains(keyword) {
                field.options = Some(Catalog::options_from(labels));
                debug!(field = %id, keyword, "Filled missing options");
                return Ok(());
            }
        }
    }

    let is_forward = id.contains("forward") || id.contains("outcome") || field.name_lower().contains("forward");
    if !is_forward {
        return Ok(());
    }
    let generic = field.options.as_ref().is_some_and(|opts| {
        opts.iter()
            .any(|o| o.name.as_deref().is_some_and(is_generic_label))
    });
    if missing || generic {
        field.options = Some(Catalog::options_from(&ctx.catalog.forward_outcomes));
        if field.value.is_generic() {
            field.value = FieldValue::Null;
        }
        debug!(field = %id, "Replaced generic forward options");
    }
    Ok(())
}

fn backfill_candidates(id: &str) -> &'static [&'static str] {
    if id.contains("circle") {
        &["circle"]
    } else if id.contains("client") {
        &["client", "clientname", "customer", "vendor"]
    } else if id.contains("date") {
        if id.contains("survey") {
            &["surveydate"]
        } else if id.contains("allotment") || id.contains("allocation") {
            &["allotmentdate", "allocationdate"]
        } else {
            &["date"]
        }
    } else if id.contains("activity") {
        &["activitytype", "activity"]
    } else {
        &[]
    }
}

fn heuristic_backfill(field: &mut FormField, ctx: &PopulateContext) -> Result<()> {
    let id = field.id_lower();
    for candidate in backfill_candidates(&id) {
        if let Some(value) = ctx.values.lower(candidate)
            && !value.is_blank()
        {
            debug!(field = %id, source = candidate, "Heuristic backfill");
            field.value = value.clone();
            break;
        }
    }
    Ok(())
}

fn key_lookup(field: &mut FormField, ctx: &PopulateContext) -> Result<()> {
    let Some(id) = field.id.as_deref() else {
        return Ok(());
    };
    if let Some(value) = ctx.values.lookup(id) {
        field.value = value.clone();
        return Ok(());
    }
    if let Some((key, value)) = ctx.values.containing(id) {
        debug!(field = id, matched = key, "Relaxed key match");
        field.value = value.clone();
    }
    Ok(())
}

/// Appends `{id: value, name: value}` when the displayed value is not selectable.
pub fn ensure_value_in_options(field: &mut FormField) {
    if field.value.is_blank() {
        return;
    }
    let Some(options) = field.options.as_mut() else {
        return;
    };
    let current = field.value.display().trim().to_lowercase();
    let present = options.iter().any(|o| {
        let id = o.id.as_deref().unwrap_or_default().trim().to_lowercase();
        let name = o.name.as_deref().unwrap_or_default().trim().to_lowercase();
        id == current || name == current
    });
    if !present {
        options.push(FieldOption::new(&field.value.display()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpressionTarget {
    Value,
    Name,
}

fn expression_target(field: &FormField) -> Option<ExpressionTarget> {
    let use_name = field.field_type.is_display() && field.value.is_blank() && field.name.is_some();
    let content = if use_name {
        field.name.as_deref()
    } else {
        field.value.as_text()
    };
    if content.is_some_and(|c| c.contains("${")) {
        Some(if use_name {
            ExpressionTarget::Name
        } else {
            ExpressionTarget::Value
        })
    } else {
        None
    }
}

fn substitute_expressions(field: &mut FormField, ctx: &PopulateContext) -> Result<()> {
    let Some(target) = expression_target(field) else {
        return Ok(());
    };
    let content = match target {
        ExpressionTarget::Name => field.name.clone().unwrap_or_default(),
        ExpressionTarget::Value => field.value.display(),
    };
    let resolved = PLACEHOLDER
        .replace_all(&content, |caps: &Captures| {
            ctx.values
                .lookup(&caps[1])
                .map(FieldValue::display)
                .unwrap_or_default()
        })
        .into_owned();

    match target {
        ExpressionTarget::Name => {
            field.name = Some(resolved.clone());
            field.value = FieldValue::Text(resolved);
        }
        ExpressionTarget::Value => field.value = FieldValue::Text(resolved),
    }
    if field.field_type.is_option_bearing() && field.has_options() {
        ensure_value_in_options(field);
    }
    Ok(())
}
