//! API response shapes to declarative state.
//!
//! Fields the remote never echoes (the webhook secret) are carried over from
//! prior state. Absent lists decode as empty lists. Rollout weights keep the
//! order they arrive in.

use serde::de::Error as _;

use crate::api;
use crate::error::{ProviderError, ProviderResult};
use crate::identity::{FlagEnvironmentId, FlagId, SegmentId};
use crate::model::{
    Clause, ClientSideAvailabilityState, Effect, Fallthrough, FeatureFlagLookup,
    FlagEnvironmentConfig, FlagRule, Operator, PolicyStatement, Prerequisite, ProjectLookup,
    SegmentConfig, SegmentRule, UserTarget, ValueType, VariationState, WebhookConfig,
};

fn unexpected(what: &str, value: &str) -> ProviderError {
    ProviderError::Serialization(serde_json::Error::custom(format!(
        "unexpected {} {:?} in API response",
        what, value
    )))
}

/// Decode a statement.
pub fn statement(statement: &api::Statement) -> ProviderResult<PolicyStatement> {
    Ok(PolicyStatement {
        resources: statement.resources.clone(),
        not_resources: statement.not_resources.clone(),
        actions: statement.actions.clone(),
        not_actions: statement.not_actions.clone(),
        effect: Effect::parse(&statement.effect).ok_or_else(|| unexpected("effect", &statement.effect))?,
    })
}

/// Decode every statement in order.
pub fn statements(statements: &[api::Statement]) -> ProviderResult<Vec<PolicyStatement>> {
    statements.iter().map(statement).collect()
}

/// Decode a clause, inferring `value_type` from its values.
pub fn clause(clause: &api::Clause) -> ProviderResult<Clause> {
    let op = Operator::parse(&clause.op).ok_or_else(|| unexpected("clause operator", &clause.op))?;
    Ok(Clause {
        attribute: clause.attribute.clone(),
        op,
        values: clause.values.iter().map(ValueType::render).collect(),
        value_type: ValueType::infer(&clause.values),
        negate: clause.negate,
    })
}

/// Keep the configured spelling of values the remote echoed back unchanged
/// in meaning, such as `"42.0"` read back as `42`.
pub fn retain_value_text(decoded: &mut [Clause], configured: &[Clause]) {
    for (clause, prior) in decoded.iter_mut().zip(configured) {
        if clause.attribute != prior.attribute
            || clause.value_type != prior.value_type
            || clause.values.len() != prior.values.len()
        {
            continue;
        }
        for (value, text) in clause.values.iter_mut().zip(&prior.values) {
            if prior.value_type.same(value, text) {
                value.clone_from(text);
            }
        }
    }
}

fn clauses(clauses: &[api::Clause]) -> ProviderResult<Vec<Clause>> {
    clauses.iter().map(clause).collect()
}

/// Weights in the order the remote lists them.
pub fn rollout_weights(rollout: &api::Rollout) -> Vec<i64> {
    rollout.variations.iter().map(|v| v.weight).collect()
}

/// Decode a fallthrough.
pub fn fallthrough(serve: &api::VariationOrRollout) -> Fallthrough {
    match &serve.rollout {
        Some(rollout) => Fallthrough {
            variation: None,
            rollout_weights: rollout_weights(rollout),
            bucket_by: rollout.bucket_by.clone(),
        },
        None => Fallthrough {
            variation: serve.variation,
            rollout_weights: Vec::new(),
            bucket_by: None,
        },
    }
}

/// Decode a flag rule.
pub fn flag_rule(rule: &api::Rule) -> ProviderResult<FlagRule> {
    let serve = fallthrough(&api::VariationOrRollout {
        variation: rule.variation,
        rollout: rule.rollout.clone(),
    });
    Ok(FlagRule {
        clauses: clauses(&rule.clauses)?,
        variation: serve.variation,
        rollout_weights: serve.rollout_weights,
        bucket_by: serve.bucket_by,
    })
}

/// Expand targets back to one entry per variation, or none if nobody is targeted.
pub fn user_targets(targets: &[api::Target], variation_count: usize) -> Vec<UserTarget> {
    if targets.is_empty() {
        return Vec::new();
    }
    let mut expanded = vec![UserTarget::default(); variation_count];
    for target in targets {
        // Targets for variations the flag does not have are dropped.
        let slot = usize::try_from(target.variation)
            .ok()
            .and_then(|index| expanded.get_mut(index));
        if let Some(slot) = slot {
            slot.values.extend(target.values.iter().cloned());
        }
    }
    expanded
}

/// Decode a segment rule.
pub fn segment_rule(rule: &api::UserSegmentRule) -> ProviderResult<SegmentRule> {
    Ok(SegmentRule {
        clauses: clauses(&rule.clauses)?,
        weight: rule.weight,
        bucket_by: rule.bucket_by.clone(),
    })
}

/// Decode a webhook, keeping the locally configured secret.
pub fn webhook(webhook: &api::Webhook, secret: Option<String>) -> ProviderResult<WebhookConfig> {
    Ok(WebhookConfig {
        id: Some(webhook.id.clone()),
        url: webhook.url.clone(),
        secret,
        enabled: webhook.on,
        name: webhook.name.clone(),
        tags: webhook.tags.iter().cloned().collect(),
        policy_statements: statements(&webhook.statements)?,
    })
}

/// Decode a segment into its environment.
pub fn segment(segment: &api::UserSegment, id: &SegmentId) -> ProviderResult<SegmentConfig> {
    Ok(SegmentConfig {
        id: Some(id.to_string()),
        project_key: id.project_key.clone(),
        env_key: id.env_key.clone(),
        key: segment.key.clone(),
        name: segment.name.clone(),
        description: segment.description.clone(),
        tags: segment.tags.iter().cloned().collect(),
        included: segment.included.clone(),
        excluded: segment.excluded.clone(),
        rules: segment
            .rules
            .iter()
            .map(segment_rule)
            .collect::<ProviderResult<_>>()?,
    })
}

/// Decode one environment of a flag. Every attribute is populated.
pub fn flag_environment(
    flag: &api::FeatureFlag,
    id: &FlagEnvironmentId,
) -> ProviderResult<FlagEnvironmentConfig> {
    let env = flag.environments.get(&id.env_key).ok_or_else(|| {
        ProviderError::NotFound(format!(
            "flag {:?} has no environment {:?}",
            id.flag.to_string(),
            id.env_key
        ))
    })?;

    Ok(FlagEnvironmentConfig {
        id: Some(id.to_string()),
        flag_id: id.flag.to_string(),
        env_key: id.env_key.clone(),
        targeting_enabled: Some(env.on),
        track_events: Some(env.track_events),
        off_variation: env.off_variation,
        flag_fallthrough: Some(
            env.fallthrough
                .as_ref()
                .map(fallthrough)
                .unwrap_or_default(),
        ),
        rules: env.rules.iter().map(flag_rule).collect::<ProviderResult<_>>()?,
        prerequisites: env
            .prerequisites
            .iter()
            .map(|p| Prerequisite {
                flag_key: p.key.clone(),
                variation: p.variation,
            })
            .collect(),
        user_targets: user_targets(&env.targets, flag.variations.len()),
    })
}

/// Decode a project lookup.
pub fn project(project: &api::Project) -> ProjectLookup {
    ProjectLookup {
        id: Some(project.key.clone()),
        key: project.key.clone(),
        name: Some(project.name.clone()),
        tags: project.tags.iter().cloned().collect(),
    }
}

/// Strings verbatim, anything else as compact JSON.
pub fn variation_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode a flag lookup.
pub fn feature_flag(flag: &api::FeatureFlag, id: &FlagId) -> FeatureFlagLookup {
    FeatureFlagLookup {
        id: Some(id.to_string()),
        project_key: id.project_key.clone(),
        key: flag.key.clone(),
        name: Some(flag.name.clone()),
        description: Some(flag.description.clone()),
        temporary: Some(flag.temporary),
        tags: flag.tags.iter().cloned().collect(),
        variations: flag
            .variations
            .iter()
            .map(|v| VariationState {
                value: variation_value(&v.value),
                name: v.name.clone(),
                description: v.description.clone(),
            })
            .collect(),
        client_side_availability: flag.client_side_availability.map(|c| {
            ClientSideAvailabilityState {
                using_environment_id: c.using_environment_id,
                using_mobile_key: c.using_mobile_key,
            }
        }),
    }
}
