//! Attribute diff between prior and proposed state.
//!
//! Computed-only attributes are never reported: the provider owns them.
//! An optional+computed attribute or block the configuration leaves unset
//! keeps its prior value. Null, an empty string and an empty list are the
//! same value. Sets compare without regard to order.

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Block, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan the transition from `prior` (None on create) to `proposed`.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let empty = Map::new();
    let proposed_fields = proposed.as_object().unwrap_or(&empty);
    let prior_fields = prior.and_then(Value::as_object);

    let mut planned = proposed_fields.clone();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attribute) in &schema.block.attributes {
        let before = prior_fields.and_then(|p| present(p.get(name)));
        let mut after = present(proposed_fields.get(name));

        if attribute.flags.computed && after.is_none() {
            if let Some(kept) = before {
                planned.insert(name.clone(), kept.clone());
            }
            if !attribute.flags.optional {
                continue;
            }
            after = before;
        }

        if same_attribute(attribute, before, after) {
            continue;
        }
        if attribute.force_new && prior.is_some() {
            requires_replace = true;
        }
        let change = AttributeChange::new(name.clone(), before.cloned(), after.cloned());
        changes.push(if attribute.flags.sensitive {
            change.redacted()
        } else {
            change
        });
    }

    for (name, nested) in &schema.block.blocks {
        let before = prior_fields.and_then(|p| present(p.get(name)));
        let mut after = present(proposed_fields.get(name));

        if nested.computed && after.is_none() {
            if let Some(kept) = before {
                planned.insert(name.clone(), kept.clone());
            }
            after = before;
        }

        if same_value(before, after) {
            continue;
        }
        if prior.is_some() && block_forces_new(&nested.block) {
            requires_replace = true;
        }
        changes.push(AttributeChange::new(
            name.clone(),
            before.cloned(),
            after.cloned(),
        ));
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn block_forces_new(block: &Block) -> bool {
    block.attributes.values().any(|a| a.force_new)
}

/// Null, empty strings and empty collections count as absent.
fn present(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.is_empty() => None,
        Some(Value::Array(items)) if items.is_empty() => None,
        Some(other) => Some(other),
    }
}

fn same_value(before: Option<&Value>, after: Option<&Value>) -> bool {
    before == after
}

fn same_attribute(attribute: &Attribute, before: Option<&Value>, after: Option<&Value>) -> bool {
    match (&attribute.attr_type, before, after) {
        (AttributeType::Set(_), Some(Value::Array(a)), Some(Value::Array(b))) => {
            sorted(a) == sorted(b)
        }
        _ => same_value(before, after),
    }
}

fn sorted(items: &[Value]) -> Vec<String> {
    let mut keys: Vec<String> = items.iter().map(Value::to_string).collect();
    keys.sort();
    keys
}
