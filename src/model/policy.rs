use std::fmt;

use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::error::{ProviderError, ProviderResult};
use crate::schema::{Attribute, AttributeValidator, Block, NestedBlock};

/// Whether a statement grants or withholds the listed actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant.
    Allow,
    /// Withhold.
    Deny,
}

impl Effect {
    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }

    /// Parse the wire spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `policy_statements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Resource specifiers the statement applies to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<String>,
    /// Resource specifiers the statement applies to all but.
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_resources: Vec<String>,
    /// Actions covered.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<String>,
    /// Actions excluded.
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_actions: Vec<String>,
    /// Allow or deny.
    pub effect: Effect,
}

impl PolicyStatement {
    /// Exactly one of each exclusive pair must be populated.
    pub fn validate(&self) -> ProviderResult<()> {
        exclusive_pair(&self.resources, &self.not_resources, "resources", "not_resources")?;
        exclusive_pair(&self.actions, &self.not_actions, "actions", "not_actions")
    }

    /// Nested block schema shared by webhooks and access policies.
    pub fn schema() -> NestedBlock {
        let list = || Attribute::optional_string_list();
        NestedBlock::list(
            Block::new()
                .with_attribute("resources", list().with_description("Resource specifiers"))
                .with_attribute("not_resources", list().with_description("Excluded resource specifiers"))
                .with_attribute("actions", list().with_description("Actions"))
                .with_attribute("not_actions", list().with_description("Excluded actions"))
                .with_attribute(
                    "effect",
                    Attribute::required_string()
                        .with_validator(AttributeValidator::one_of(&["allow", "deny"]))
                        .with_description("Either allow or deny"),
                ),
        )
        .with_min_items(1)
    }
}

fn exclusive_pair(set: &[String], not_set: &[String], name: &str, not_name: &str) -> ProviderResult<()> {
    match (set.is_empty(), not_set.is_empty()) {
        (false, false) => Err(ProviderError::Validation(format!(
            "policy_statements cannot contain both '{}' and '{}'",
            name, not_name
        ))),
        (true, true) => Err(ProviderError::Validation(format!(
            "policy_statements must contain either '{}' or '{}'",
            name, not_name
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement(value: serde_json::Value) -> PolicyStatement {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_statement() {
        let s = statement(json!({"resources": ["proj/*"], "actions": ["turnFlagOn"], "effect": "allow"}));
        assert!(s.validate().is_ok());
        assert!(s.not_resources.is_empty());
        assert_eq!(s.effect, Effect::Allow);
    }

    #[test]
    fn test_rejects_both_resources() {
        let s = statement(json!({
            "resources": ["proj/*"],
            "not_resources": ["proj/test"],
            "actions": ["*"],
            "effect": "deny",
        }));
        assert_eq!(
            s.validate().unwrap_err().message(),
            "policy_statements cannot contain both 'resources' and 'not_resources'"
        );
    }

    #[test]
    fn test_rejects_neither_resource() {
        let s = statement(json!({"resources": null, "actions": ["*"], "effect": "allow"}));
        assert_eq!(
            s.validate().unwrap_err().message(),
            "policy_statements must contain either 'resources' or 'not_resources'"
        );
    }

    #[test]
    fn test_rejects_action_pairs() {
        let both = statement(json!({
            "resources": ["proj/*"],
            "actions": ["*"],
            "not_actions": ["deleteFlag"],
            "effect": "allow",
        }));
        assert_eq!(
            both.validate().unwrap_err().message(),
            "policy_statements cannot contain both 'actions' and 'not_actions'"
        );

        let neither = statement(json!({"not_resources": ["proj/*"], "effect": "allow"}));
        assert_eq!(
            neither.validate().unwrap_err().message(),
            "policy_statements must contain either 'actions' or 'not_actions'"
        );
    }

    #[test]
    fn test_unknown_effect_is_rejected() {
        let result = serde_json::from_value::<PolicyStatement>(
            json!({"resources": ["a"], "actions": ["b"], "effect": "maybe"}),
        );
        assert!(result.is_err());
        assert_eq!(Effect::parse("deny"), Some(Effect::Deny));
        assert_eq!(Effect::parse("Deny"), None);
    }
}
