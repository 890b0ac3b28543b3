//! JSON-Patch documents per resource kind.
//!
//! Webhooks and segments replace every mutable field on each update, zero
//! values included. A flag environment only replaces what its declarative
//! state sets, so unset attributes keep their remote value.

use crate::api::{PatchOperation, VariationOrRollout};
use crate::encode;
use crate::error::ProviderResult;
use crate::model::{FlagEnvironmentConfig, SegmentConfig, WebhookConfig};

/// Full replacement of a webhook's mutable fields.
pub fn webhook(config: &WebhookConfig) -> ProviderResult<Vec<PatchOperation>> {
    let mut patch = vec![
        PatchOperation::replace("/url", &config.url)?,
        PatchOperation::replace("/secret", config.secret.as_deref().unwrap_or_default())?,
        PatchOperation::replace("/on", &config.enabled)?,
        PatchOperation::replace("/name", config.name.as_deref().unwrap_or_default())?,
        PatchOperation::replace("/tags", &encode::tags(&config.tags))?,
    ];
    if !config.policy_statements.is_empty() {
        patch.push(PatchOperation::replace(
            "/statements",
            &encode::statements(&config.policy_statements),
        )?);
    }
    Ok(patch)
}

/// Full replacement of a segment's mutable fields.
pub fn segment(config: &SegmentConfig) -> ProviderResult<Vec<PatchOperation>> {
    Ok(vec![
        PatchOperation::replace("/name", &config.name)?,
        PatchOperation::replace("/description", config.description.as_deref().unwrap_or_default())?,
        PatchOperation::replace("/tags", &encode::tags(&config.tags))?,
        PatchOperation::replace("/included", &config.included)?,
        PatchOperation::replace("/excluded", &config.excluded)?,
        PatchOperation::replace("/rules", &encode::segment_rules(&config.rules)?)?,
    ])
}

fn env_path(env_key: &str, field: &str) -> String {
    format!("/environments/{}/{}", env_key, field)
}

/// Replacement of the flag environment fields the declarative state sets.
pub fn flag_environment(
    config: &FlagEnvironmentConfig,
    variation_count: usize,
) -> ProviderResult<Vec<PatchOperation>> {
    let env = config.env_key.as_str();
    let mut patch = Vec::new();

    if let Some(on) = config.targeting_enabled {
        patch.push(PatchOperation::replace(env_path(env, "on"), &on)?);
    }
    if let Some(track) = config.track_events {
        patch.push(PatchOperation::replace(env_path(env, "trackEvents"), &track)?);
    }
    if let Some(off) = config.off_variation {
        patch.push(PatchOperation::replace(env_path(env, "offVariation"), &off)?);
    }
    if let Some(fallthrough) = &config.flag_fallthrough {
        patch.push(PatchOperation::replace(
            env_path(env, "fallthrough"),
            &encode::fallthrough(fallthrough, variation_count)?,
        )?);
    }
    if !config.rules.is_empty() {
        patch.push(PatchOperation::replace(
            env_path(env, "rules"),
            &encode::flag_rules(&config.rules, variation_count)?,
        )?);
    }
    if !config.prerequisites.is_empty() {
        patch.push(PatchOperation::replace(
            env_path(env, "prerequisites"),
            &encode::prerequisites(&config.prerequisites),
        )?);
    }
    if !config.user_targets.is_empty() {
        patch.push(PatchOperation::replace(
            env_path(env, "targets"),
            &encode::user_targets(&config.user_targets),
        )?);
    }
    Ok(patch)
}

/// Return an environment to the state of a freshly created flag.
pub fn flag_environment_reset(
    env_key: &str,
    variation_count: usize,
) -> ProviderResult<Vec<PatchOperation>> {
    let empty: [(); 0] = [];
    let off_variation = variation_count.saturating_sub(1) as i64;
    Ok(vec![
        PatchOperation::replace(env_path(env_key, "on"), &false)?,
        PatchOperation::replace(env_path(env_key, "trackEvents"), &false)?,
        PatchOperation::replace(env_path(env_key, "rules"), &empty)?,
        PatchOperation::replace(env_path(env_key, "prerequisites"), &empty)?,
        PatchOperation::replace(env_path(env_key, "offVariation"), &off_variation)?,
        PatchOperation::replace(env_path(env_key, "targets"), &empty)?,
        PatchOperation::replace(
            env_path(env_key, "fallthrough"),
            &VariationOrRollout {
                variation: Some(0),
                rollout: None,
            },
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(patch: &[PatchOperation]) -> Vec<&str> {
        patch.iter().map(|op| op.path.as_str()).collect()
    }

    #[test]
    fn test_webhook_replaces_unset_with_zero_values() {
        let config: WebhookConfig =
            serde_json::from_value(json!({"url": "https://example.com", "enabled": false})).unwrap();
        let patch = webhook(&config).unwrap();

        assert_eq!(paths(&patch), vec!["/url", "/secret", "/on", "/name", "/tags"]);
        assert_eq!(patch[1].value, json!(""));
        assert_eq!(patch[3].value, json!(""));
        assert_eq!(patch[4].value, json!([]));
        assert!(patch.iter().all(|op| op.op == "replace"));
    }

    #[test]
    fn test_webhook_statements_only_when_set() {
        let config: WebhookConfig = serde_json::from_value(json!({
            "url": "https://example.com",
            "enabled": true,
            "policy_statements": [{"resources": ["proj/*"], "actions": ["turnFlagOn"], "effect": "allow"}],
        }))
        .unwrap();
        let patch = webhook(&config).unwrap();
        assert_eq!(patch.last().unwrap().path, "/statements");
        assert_eq!(
            patch.last().unwrap().value,
            json!([{"resources": ["proj/*"], "actions": ["turnFlagOn"], "effect": "allow"}])
        );
    }

    #[test]
    fn test_segment_is_unconditional() {
        let config: SegmentConfig = serde_json::from_value(json!({
            "project_key": "default",
            "env_key": "test",
            "key": "beta",
            "name": "Beta",
        }))
        .unwrap();
        let patch = segment(&config).unwrap();
        assert_eq!(
            paths(&patch),
            vec!["/name", "/description", "/tags", "/included", "/excluded", "/rules"]
        );
        assert_eq!(patch[5].value, json!([]));
    }

    #[test]
    fn test_flag_environment_only_present_fields() {
        let config: FlagEnvironmentConfig = serde_json::from_value(json!({
            "flag_id": "default/basic-flag",
            "env_key": "test",
            "targeting_enabled": false,
            "flag_fallthrough": {"variation": 1},
        }))
        .unwrap();
        let patch = flag_environment(&config, 3).unwrap();
        assert_eq!(
            paths(&patch),
            vec!["/environments/test/on", "/environments/test/fallthrough"]
        );
        assert_eq!(patch[1].value, json!({"variation": 1}));
    }

    #[test]
    fn test_flag_environment_rollout_mismatch() {
        let config: FlagEnvironmentConfig = serde_json::from_value(json!({
            "flag_id": "default/basic-flag",
            "env_key": "test",
            "flag_fallthrough": {"rollout_weights": [50000, 50000]},
        }))
        .unwrap();
        assert!(flag_environment(&config, 3).is_err());
    }

    #[test]
    fn test_reset() {
        let patch = flag_environment_reset("test", 3).unwrap();
        let off = patch
            .iter()
            .find(|op| op.path == "/environments/test/offVariation")
            .unwrap();
        assert_eq!(off.value, json!(2));
        let fallthrough = patch
            .iter()
            .find(|op| op.path == "/environments/test/fallthrough")
            .unwrap();
        assert_eq!(fallthrough.value, json!({"variation": 0}));
        let rules = patch
            .iter()
            .find(|op| op.path == "/environments/test/rules")
            .unwrap();
        assert_eq!(rules.value, json!([]));
    }
}
