//! Schema validation of declarative attribute trees.
//!
//! This checks a `serde_json::Value` received from the plugin host against a
//! [`Schema`]: presence of required attributes, value types, per-field
//! validators and block item counts. Cross-field rules (mutually exclusive
//! fields, rollout weights) live with the typed model in [`crate::model`].
//!
//! # Example
//!
//! ```
//! use terraform_provider_launchdarkly::schema::{Attribute, AttributeValidator, Schema};
//! use terraform_provider_launchdarkly::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0().with_attribute(
//!     "effect",
//!     Attribute::required_string().with_validator(AttributeValidator::one_of(&["allow", "deny"])),
//! );
//!
//! assert!(validate(&schema, &json!({"effect": "allow"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"effect": "maybe"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("effect".to_string()));
//! ```

use std::collections::BTreeSet;

use serde_json::Value;

use crate::schema::{
    Attribute, AttributeType, AttributeValidator, Block, BlockNestingMode, Diagnostic,
    NestedBlock, Schema,
};

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types and validators must match the schema
/// - Set elements must be unique
/// - Nested blocks are validated recursively; `min_items` only applies once a
///   block has at least one item, an empty or missing block is always allowed
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning the diagnostics as an error.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            diagnostics.push(if path.is_empty() {
                diag
            } else {
                diag.with_attribute(path)
            });
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_value(attr, &attr.attr_type, v, path, diagnostics),
    }
}

fn validate_value(
    attr: &Attribute,
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => match value.as_str() {
            Some(s) => check_string_validators(&attr.validators, s, path, diagnostics),
            None => diagnostics.push(type_error(path, "string", value)),
        },
        AttributeType::Int64 => match as_int64(value) {
            Some(i) => check_int_validators(&attr.validators, i, path, diagnostics),
            None => diagnostics.push(type_error(path, "int64", value)),
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            let Some(items) = value.as_array() else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
                return;
            };
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_value(attr, element_type, item, &item_path, diagnostics);
            }
            if matches!(attr_type, AttributeType::Set(_)) {
                check_set_unique(items, path, diagnostics);
            }
        },
    }
}

fn check_string_validators(
    validators: &[AttributeValidator],
    value: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for validator in validators {
        if let AttributeValidator::OneOf(allowed) = validator {
            if !allowed.iter().any(|a| a == value) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!(
                            "expected one of [{}], got \"{}\"",
                            allowed.join(", "),
                            value
                        ))
                        .with_attribute(path),
                );
            }
        }
    }
}

fn check_int_validators(
    validators: &[AttributeValidator],
    value: i64,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for validator in validators {
        let violation = match validator {
            AttributeValidator::IntBetween(min, max) if value < *min || value > *max => {
                Some(format!("expected a value between {} and {}, got {}", min, max, value))
            },
            AttributeValidator::IntAtLeast(min) if value < *min => {
                Some(format!("expected a value of at least {}, got {}", min, value))
            },
            _ => None,
        };
        if let Some(detail) = violation {
            diagnostics.push(
                Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                    .with_detail(detail)
                    .with_attribute(path),
            );
        }
    }
}

fn check_set_unique(items: &[Value], path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item.to_string()) {
            diagnostics.push(
                Diagnostic::error(format!("Duplicate set element in '{}'", path))
                    .with_detail(format!("{} appears more than once", item))
                    .with_attribute(path),
            );
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match nested.nesting_mode {
        BlockNestingMode::Single => validate_single_block(nested, value, path, diagnostics),
        BlockNestingMode::List | BlockNestingMode::Set => {
            validate_list_block(nested, value, path, diagnostics)
        },
    }
}

fn validate_single_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {},
        // A single block may also arrive in its list-of-one encoding.
        Some(Value::Array(items)) => {
            if items.len() > 1 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most 1 item(s), got {}",
                        path,
                        items.len()
                    ))
                    .with_attribute(path),
                );
            }
            for (i, item) in items.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        Some(v) => validate_block(&nested.block, v, path, diagnostics),
    }
}

fn validate_list_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {},
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len > 0 && len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_int64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        ))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("url", Attribute::required_string());

        assert!(validate(&schema, &json!({"url": "https://example.com"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("url".to_string()));

        assert_eq!(validate(&schema, &json!({"url": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"url": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_validate_one_of() {
        let schema = Schema::v0().with_attribute(
            "effect",
            Attribute::required_string()
                .with_validator(AttributeValidator::one_of(&["allow", "deny"])),
        );

        assert!(is_valid(&schema, &json!({"effect": "deny"})));

        let diagnostics = validate(&schema, &json!({"effect": "Allow"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("allow, deny"));
    }

    #[test]
    fn test_validate_int_between_on_list_elements() {
        let schema = Schema::v0().with_attribute(
            "rollout_weights",
            Attribute::new(
                AttributeType::list(AttributeType::Int64),
                crate::schema::AttributeFlags::optional(),
            )
            .with_validator(AttributeValidator::IntBetween(0, 100_000)),
        );

        assert!(is_valid(&schema, &json!({"rollout_weights": [60000, 40000, 0]})));

        let diagnostics = validate(&schema, &json!({"rollout_weights": [60000, 140000]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("rollout_weights.1".to_string())
        );
    }

    #[test]
    fn test_validate_int_at_least() {
        let schema = Schema::v0().with_attribute(
            "variation",
            Attribute::optional_int64().with_validator(AttributeValidator::IntAtLeast(0)),
        );

        assert!(is_valid(&schema, &json!({"variation": 0})));
        assert!(is_valid(&schema, &json!({"variation": 2.0})));
        assert!(!is_valid(&schema, &json!({"variation": -1})));
        assert!(!is_valid(&schema, &json!({"variation": 1.5})));
    }

    #[test]
    fn test_validate_set_uniqueness() {
        let schema = Schema::v0().with_attribute("tags", Attribute::optional_string_set());

        assert!(is_valid(&schema, &json!({"tags": ["a", "b"]})));

        let diagnostics = validate(&schema, &json!({"tags": ["a", "b", "a"]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Duplicate"));
    }

    #[test]
    fn test_validate_list_wrong_element() {
        let schema = Schema::v0().with_attribute("included", Attribute::optional_string_list());

        let diagnostics = validate(&schema, &json!({"included": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("included.1".to_string()));

        assert_eq!(validate(&schema, &json!({"included": "a"})).len(), 1);
    }

    #[test]
    fn test_validate_single_block_accepts_list_of_one() {
        let schema = Schema::v0().with_block(
            "flag_fallthrough",
            NestedBlock::single(Block::new().with_attribute("variation", Attribute::optional_int64())),
        );

        assert!(is_valid(&schema, &json!({"flag_fallthrough": {"variation": 1}})));
        assert!(is_valid(&schema, &json!({"flag_fallthrough": [{"variation": 1}]})));

        let diagnostics = validate(
            &schema,
            &json!({"flag_fallthrough": [{"variation": 1}, {"variation": 2}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));
    }

    #[test]
    fn test_validate_nested_block_list_min_items() {
        let schema = Schema::v0().with_block(
            "policy_statements",
            NestedBlock::list(Block::new().with_attribute("effect", Attribute::required_string()))
                .with_min_items(2),
        );

        assert!(is_valid(&schema, &json!({})));
        assert!(is_valid(&schema, &json!({"policy_statements": []})));

        let diagnostics = validate(&schema, &json!({"policy_statements": [{"effect": "allow"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 2"));
    }

    #[test]
    fn test_validate_deeply_nested() {
        let schema = Schema::v0().with_block(
            "rules",
            NestedBlock::list(
                Block::new().with_block(
                    "clauses",
                    NestedBlock::list(
                        Block::new().with_attribute("attribute", Attribute::required_string()),
                    ),
                ),
            ),
        );

        assert!(is_valid(
            &schema,
            &json!({"rules": [{"clauses": [{"attribute": "country"}]}]})
        ));

        let diagnostics = validate(&schema, &json!({"rules": [{"clauses": [{"attribute": 7}]}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("rules.0.clauses.0.attribute".to_string())
        );
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = Schema::v0().with_attribute("key", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"key": "proj"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("key", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }
}
