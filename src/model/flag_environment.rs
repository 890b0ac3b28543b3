use serde::{Deserialize, Serialize};

use super::{null_as_default, single_block, Fallthrough, FlagRule, Prerequisite, UserTarget};
use crate::error::{ProviderError, ProviderResult};
use crate::identity::{FlagEnvironmentId, FlagId};
use crate::schema::{Attribute, AttributeValidator, Schema};

/// Declarative state of `launchdarkly_feature_flag_environment`.
///
/// Optional attributes left unset are not managed: updates leave their
/// remote value alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEnvironmentConfig {
    /// `project_key/env_key/flag_key`.
    #[serde(default)]
    pub id: Option<String>,
    /// `project_key/flag_key` of the flag.
    pub flag_id: String,
    /// Environment key.
    pub env_key: String,
    /// Whether targeting is on.
    #[serde(default)]
    pub targeting_enabled: Option<bool>,
    /// Whether full event tracking is on.
    #[serde(default)]
    pub track_events: Option<bool>,
    /// Variation served when targeting is off.
    #[serde(default)]
    pub off_variation: Option<i64>,
    /// Served when targeting is on and no rule matches.
    #[serde(default, deserialize_with = "single_block")]
    pub flag_fallthrough: Option<Fallthrough>,
    /// Ordered targeting rules.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<FlagRule>,
    /// Flags that must serve a given variation first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub prerequisites: Vec<Prerequisite>,
    /// Individually targeted users, one entry per variation index.
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_targets: Vec<UserTarget>,
}

impl FlagEnvironmentConfig {
    /// Parsed `flag_id`.
    pub fn flag(&self) -> ProviderResult<FlagId> {
        self.flag_id.parse()
    }

    /// Composite identity of this flag environment.
    pub fn environment_id(&self) -> ProviderResult<FlagEnvironmentId> {
        Ok(FlagEnvironmentId::new(self.flag()?, self.env_key.as_str()))
    }

    /// Resource schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "flag_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The flag's `project_key/flag_key`"),
            )
            .with_attribute("env_key", Attribute::required_string().with_force_new())
            .with_attribute("targeting_enabled", Attribute::optional_bool().with_computed())
            .with_attribute("track_events", Attribute::optional_bool().with_computed())
            .with_attribute(
                "off_variation",
                Attribute::optional_int64()
                    .with_computed()
                    .with_validator(AttributeValidator::IntAtLeast(0)),
            )
            .with_block("flag_fallthrough", Fallthrough::schema())
            .with_block("rules", FlagRule::schema())
            .with_block("prerequisites", Prerequisite::schema())
            .with_block("user_targets", UserTarget::schema())
    }

    /// Cross-field checks over every nested block.
    pub fn validate(&self) -> ProviderResult<()> {
        self.flag()?;
        if let Some(off) = self.off_variation {
            if off < 0 {
                return Err(ProviderError::Validation(format!(
                    "off_variation must not be negative, got {}",
                    off
                )));
            }
        }
        if let Some(fallthrough) = &self.flag_fallthrough {
            fallthrough.validate()?;
        }
        self.rules.iter().try_for_each(FlagRule::validate)?;
        for prerequisite in &self.prerequisites {
            if prerequisite.variation < 0 {
                return Err(ProviderError::Validation(format!(
                    "prerequisite {:?} variation must not be negative",
                    prerequisite.flag_key
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_block() {
        let config: FlagEnvironmentConfig = serde_json::from_value(json!({
            "flag_id": "default/basic-flag",
            "env_key": "test",
            "targeting_enabled": true,
            "track_events": true,
            "user_targets": [{"values": []}, {"values": ["user1", "user2"]}, {"values": []}],
            "rules": [
                {"clauses": [{"attribute": "country", "op": "startsWith", "values": ["great", "amazing"], "negate": false}], "variation": 0},
                {"clauses": [{"attribute": "name", "op": "startsWith", "values": ["h"]}], "rollout_weights": [90000, 10000, 0], "bucket_by": "email"}
            ],
            "flag_fallthrough": [{"rollout_weights": [60000, 40000, 0], "bucket_by": "email"}]
        }))
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.environment_id().unwrap().to_string(), "default/test/basic-flag");
        assert_eq!(config.user_targets[1].values.len(), 2);
        assert_eq!(
            config.flag_fallthrough.unwrap().rollout_weights,
            vec![60000, 40000, 0]
        );
        assert!(config.off_variation.is_none());
    }

    #[test]
    fn test_bad_flag_id() {
        let config: FlagEnvironmentConfig =
            serde_json::from_value(json!({"flag_id": "basic-flag", "env_key": "test"})).unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ProviderError::InvalidIdentity(_)
        ));
    }

    #[test]
    fn test_fallthrough_with_bucket_by_and_variation() {
        let config: FlagEnvironmentConfig = serde_json::from_value(json!({
            "flag_id": "default/basic-flag",
            "env_key": "test",
            "flag_fallthrough": {"variation": 1, "bucket_by": "email"}
        }))
        .unwrap();
        assert_eq!(
            config.validate().unwrap_err().message(),
            "cannot use bucket_by argument with variation, only with rollout_weights"
        );
    }

    #[test]
    fn test_schema_shape() {
        let schema = FlagEnvironmentConfig::schema();
        assert!(schema.block.attributes["flag_id"].force_new);
        assert!(schema.block.attributes["off_variation"].flags.computed);
        assert!(schema.block.blocks["flag_fallthrough"].computed);
        assert!(schema.block.blocks["rules"].block.blocks.contains_key("clauses"));
    }
}
