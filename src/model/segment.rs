use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{null_as_default, Clause, ROLLOUT_TOTAL};
use crate::error::{ProviderError, ProviderResult};
use crate::identity::SegmentId;
use crate::schema::{Attribute, AttributeValidator, Block, NestedBlock, Schema};

/// A segment rule: all clauses match, optionally for only `weight` of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRule {
    /// All must match.
    #[serde(default, deserialize_with = "null_as_default")]
    pub clauses: Vec<Clause>,
    /// Share of matching users included, thousandths of a percent.
    #[serde(default)]
    pub weight: Option<i64>,
    /// Attribute hashed to pick the included share.
    #[serde(default)]
    pub bucket_by: Option<String>,
}

impl SegmentRule {
    /// `bucket_by` only applies to a weighted rule.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.bucket_by.is_some() && self.weight.is_none() {
            return Err(ProviderError::Validation(
                "cannot use bucket_by argument without weight on a segment rule".to_string(),
            ));
        }
        if let Some(weight) = self.weight {
            if !(0..=ROLLOUT_TOTAL).contains(&weight) {
                return Err(ProviderError::Validation(format!(
                    "segment rule weight {} must be between 0 and {}",
                    weight, ROLLOUT_TOTAL
                )));
            }
        }
        self.clauses.iter().try_for_each(Clause::validate)
    }

    fn schema() -> NestedBlock {
        NestedBlock::list(
            Block::new()
                .with_block("clauses", Clause::schema())
                .with_attribute(
                    "weight",
                    Attribute::optional_int64()
                        .with_validator(AttributeValidator::IntBetween(0, ROLLOUT_TOTAL)),
                )
                .with_attribute("bucket_by", Attribute::optional_string()),
        )
    }
}

/// Declarative state of `launchdarkly_segment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// `project_key/env_key/key`.
    #[serde(default)]
    pub id: Option<String>,
    /// Owning project.
    pub project_key: String,
    /// Owning environment.
    pub env_key: String,
    /// Segment key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    /// User keys always in the segment.
    #[serde(default, deserialize_with = "null_as_default")]
    pub included: Vec<String>,
    /// User keys never in the segment.
    #[serde(default, deserialize_with = "null_as_default")]
    pub excluded: Vec<String>,
    /// Membership rules.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rules: Vec<SegmentRule>,
}

impl SegmentConfig {
    /// Composite identity of this segment.
    pub fn segment_id(&self) -> SegmentId {
        SegmentId::new(
            self.project_key.as_str(),
            self.env_key.as_str(),
            self.key.as_str(),
        )
    }

    /// Resource schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("project_key", Attribute::required_string().with_force_new())
            .with_attribute("env_key", Attribute::required_string().with_force_new())
            .with_attribute("key", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("tags", Attribute::optional_string_set())
            .with_attribute("included", Attribute::optional_string_list())
            .with_attribute("excluded", Attribute::optional_string_list())
            .with_block("rules", SegmentRule::schema())
    }

    /// Data source schema: the three keys in, everything else out.
    pub fn lookup_schema() -> Schema {
        let block = Self::schema().block.into_computed();
        Schema {
            version: 0,
            block: block
                .with_attribute("project_key", Attribute::required_string())
                .with_attribute("env_key", Attribute::required_string())
                .with_attribute("key", Attribute::required_string()),
        }
    }

    /// Every rule must be well-formed.
    pub fn validate(&self) -> ProviderResult<()> {
        self.rules.iter().try_for_each(SegmentRule::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segment_id() {
        let config: SegmentConfig = serde_json::from_value(json!({
            "project_key": "default",
            "env_key": "test",
            "key": "beta",
            "name": "Beta users",
        }))
        .unwrap();
        assert_eq!(config.segment_id().to_string(), "default/test/beta");
        assert!(config.description.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bucket_by_requires_weight() {
        let rule: SegmentRule = serde_json::from_value(json!({
            "clauses": [{"attribute": "email", "op": "endsWith", "values": ["@example.com"]}],
            "bucket_by": "country",
        }))
        .unwrap();
        assert!(rule.validate().is_err());

        let rule = SegmentRule {
            weight: Some(50000),
            ..rule
        };
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_force_new_keys() {
        let schema = SegmentConfig::schema();
        for key in ["project_key", "env_key", "key"] {
            assert!(schema.block.attributes[key].force_new, "{} should force replacement", key);
        }
        assert!(!schema.block.attributes["name"].force_new);
    }
}
