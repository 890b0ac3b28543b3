//! Declarative state to API request shapes.

use std::collections::BTreeSet;

use crate::api;
use crate::error::{ProviderError, ProviderResult};
use crate::model::{
    Clause, Fallthrough, FlagRule, PolicyStatement, Prerequisite, SegmentConfig, SegmentRule,
    UserTarget, WebhookConfig,
};

/// Copy a statement, leaving empty lists out of the wire shape.
pub fn statement(statement: &PolicyStatement) -> api::Statement {
    api::Statement {
        resources: statement.resources.clone(),
        not_resources: statement.not_resources.clone(),
        actions: statement.actions.clone(),
        not_actions: statement.not_actions.clone(),
        effect: statement.effect.as_str().to_string(),
    }
}

/// Encode every statement in order.
pub fn statements(statements: &[PolicyStatement]) -> Vec<api::Statement> {
    statements.iter().map(statement).collect()
}

/// Tags have no meaningful order on the wire.
pub fn tags(tags: &BTreeSet<String>) -> Vec<String> {
    tags.iter().cloned().collect()
}

/// Type each clause value per `value_type`.
pub fn clause(clause: &Clause) -> ProviderResult<api::Clause> {
    let values = clause
        .values
        .iter()
        .map(|text| {
            clause.value_type.parse(text).ok_or_else(|| {
                ProviderError::Encode(format!(
                    "clause value {:?} is not a valid {}",
                    text,
                    clause.value_type.as_str()
                ))
            })
        })
        .collect::<ProviderResult<Vec<_>>>()?;

    Ok(api::Clause {
        attribute: clause.attribute.clone(),
        op: clause.op.as_str().to_string(),
        values,
        negate: clause.negate,
    })
}

fn clauses(clauses: &[Clause]) -> ProviderResult<Vec<api::Clause>> {
    clauses.iter().map(clause).collect()
}

/// Pair `weights[i]` with variation `i`. The flag must have exactly as many variations.
pub fn rollout(
    weights: &[i64],
    bucket_by: Option<&str>,
    variation_count: usize,
) -> ProviderResult<api::Rollout> {
    if weights.len() != variation_count {
        return Err(ProviderError::Encode(format!(
            "rollout_weights has {} entries but the flag has {} variations",
            weights.len(),
            variation_count
        )));
    }
    Ok(api::Rollout {
        variations: weights
            .iter()
            .enumerate()
            .map(|(index, weight)| api::WeightedVariation {
                variation: index as i64,
                weight: *weight,
            })
            .collect(),
        bucket_by: bucket_by.map(str::to_string),
    })
}

fn variation_or_rollout(
    variation: Option<i64>,
    weights: &[i64],
    bucket_by: Option<&str>,
    variation_count: usize,
) -> ProviderResult<api::VariationOrRollout> {
    if weights.is_empty() {
        return Ok(api::VariationOrRollout {
            variation,
            rollout: None,
        });
    }
    Ok(api::VariationOrRollout {
        variation: None,
        rollout: Some(rollout(weights, bucket_by, variation_count)?),
    })
}

/// A fixed variation wins when no weights are given.
pub fn fallthrough(
    fallthrough: &Fallthrough,
    variation_count: usize,
) -> ProviderResult<api::VariationOrRollout> {
    variation_or_rollout(
        fallthrough.variation,
        &fallthrough.rollout_weights,
        fallthrough.bucket_by.as_deref(),
        variation_count,
    )
}

/// Encode a flag rule against the flag's variation count.
pub fn flag_rule(rule: &FlagRule, variation_count: usize) -> ProviderResult<api::Rule> {
    let serve = variation_or_rollout(
        rule.variation,
        &rule.rollout_weights,
        rule.bucket_by.as_deref(),
        variation_count,
    )?;
    Ok(api::Rule {
        variation: serve.variation,
        rollout: serve.rollout,
        clauses: clauses(&rule.clauses)?,
    })
}

/// Encode every rule in order.
pub fn flag_rules(rules: &[FlagRule], variation_count: usize) -> ProviderResult<Vec<api::Rule>> {
    rules
        .iter()
        .map(|rule| flag_rule(rule, variation_count))
        .collect()
}

/// Encode prerequisites in order.
pub fn prerequisites(prerequisites: &[Prerequisite]) -> Vec<api::Prerequisite> {
    prerequisites
        .iter()
        .map(|p| api::Prerequisite {
            key: p.flag_key.clone(),
            variation: p.variation,
        })
        .collect()
}

/// Position `i` targets variation `i`; empty positions are not sent.
pub fn user_targets(targets: &[UserTarget]) -> Vec<api::Target> {
    targets
        .iter()
        .enumerate()
        .filter(|(_, target)| !target.values.is_empty())
        .map(|(index, target)| api::Target {
            values: target.values.iter().cloned().collect(),
            variation: index as i64,
        })
        .collect()
}

/// Encode a segment rule.
pub fn segment_rule(rule: &SegmentRule) -> ProviderResult<api::UserSegmentRule> {
    Ok(api::UserSegmentRule {
        clauses: clauses(&rule.clauses)?,
        weight: rule.weight,
        bucket_by: rule.bucket_by.clone(),
    })
}

/// Encode every segment rule in order.
pub fn segment_rules(rules: &[SegmentRule]) -> ProviderResult<Vec<api::UserSegmentRule>> {
    rules.iter().map(segment_rule).collect()
}

/// `POST /webhooks` body. Signing is on exactly when a secret is configured.
pub fn webhook_body(config: &WebhookConfig) -> api::WebhookBody {
    let secret = config.secret.clone().filter(|s| !s.is_empty());
    api::WebhookBody {
        url: config.url.clone(),
        sign: secret.is_some(),
        secret,
        on: config.enabled,
        name: config.name.clone(),
        statements: statements(&config.policy_statements),
    }
}

/// `POST /segments/{project}/{env}` body.
pub fn segment_body(config: &SegmentConfig) -> api::UserSegmentBody {
    api::UserSegmentBody {
        name: config.name.clone(),
        key: config.key.clone(),
        description: config.description.clone(),
        tags: tags(&config.tags),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Effect, Operator, ValueType};
    use serde_json::json;

    fn clause_of(value_type: ValueType, values: &[&str]) -> Clause {
        Clause {
            attribute: "answer".into(),
            op: Operator::In,
            values: values.iter().map(|v| v.to_string()).collect(),
            value_type,
            negate: false,
        }
    }

    #[test]
    fn test_statement_omits_empty_fields() {
        let encoded = statement(&PolicyStatement {
            resources: vec!["proj/*".into()],
            not_resources: vec![],
            actions: vec!["turnFlagOn".into()],
            not_actions: vec![],
            effect: Effect::Allow,
        });
        assert_eq!(
            serde_json::to_value(encoded).unwrap(),
            json!({"resources": ["proj/*"], "actions": ["turnFlagOn"], "effect": "allow"})
        );
    }

    #[test]
    fn test_clause_values_typed() {
        let encoded = clause(&clause_of(ValueType::Number, &["42", "84"])).unwrap();
        assert_eq!(encoded.values, vec![json!(42), json!(84)]);

        let encoded = clause(&clause_of(ValueType::Boolean, &["true"])).unwrap();
        assert_eq!(encoded.values, vec![json!(true)]);

        let encoded = clause(&clause_of(ValueType::String, &["true"])).unwrap();
        assert_eq!(encoded.values, vec![json!("true")]);
        assert_eq!(encoded.op, "in");

        assert!(matches!(
            clause(&clause_of(ValueType::Number, &["many"])),
            Err(ProviderError::Encode(_))
        ));
    }

    #[test]
    fn test_rollout_positions() {
        let encoded = rollout(&[60000, 40000, 0], Some("email"), 3).unwrap();
        let pairs: Vec<(i64, i64)> = encoded
            .variations
            .iter()
            .map(|v| (v.variation, v.weight))
            .collect();
        assert_eq!(pairs, vec![(0, 60000), (1, 40000), (2, 0)]);
        assert_eq!(encoded.bucket_by.as_deref(), Some("email"));
    }

    #[test]
    fn test_rollout_length_mismatch_is_fatal() {
        let err = rollout(&[60000, 40000], None, 3).unwrap_err();
        assert!(matches!(err, ProviderError::Encode(_)));
        assert!(err.message().contains("3 variations"));
    }

    #[test]
    fn test_fallthrough_variation_only() {
        let encoded = fallthrough(
            &Fallthrough {
                variation: Some(1),
                ..Default::default()
            },
            3,
        )
        .unwrap();
        assert_eq!(encoded.variation, Some(1));
        assert!(encoded.rollout.is_none());
    }

    #[test]
    fn test_user_targets_skip_empty_positions() {
        let targets = vec![
            UserTarget::default(),
            UserTarget {
                values: ["user1".to_string(), "user2".to_string()].into_iter().collect(),
            },
            UserTarget::default(),
        ];
        let encoded = user_targets(&targets);
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded[0].variation, 1);
        assert_eq!(encoded[0].values, vec!["user1", "user2"]);
    }

    #[test]
    fn test_webhook_sign_follows_secret() {
        let mut config = WebhookConfig {
            id: None,
            url: "https://example.com".into(),
            secret: Some("".into()),
            enabled: true,
            name: Some("hook".into()),
            tags: BTreeSet::new(),
            policy_statements: vec![],
        };
        let body = webhook_body(&config);
        assert!(!body.sign);
        assert!(body.secret.is_none());

        config.secret = Some("s3cret".into());
        let body = webhook_body(&config);
        assert!(body.sign);
        assert_eq!(body.secret.as_deref(), Some("s3cret"));
    }
}
