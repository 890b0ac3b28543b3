use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{null_as_default, PolicyStatement};
use crate::error::ProviderResult;
use crate::schema::{Attribute, Schema};

/// Declarative state of `launchdarkly_webhook`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Server-assigned id.
    #[serde(default)]
    pub id: Option<String>,
    /// Delivery URL.
    pub url: String,
    /// Signing secret. Write-only: the remote never echoes it.
    #[serde(default)]
    pub secret: Option<String>,
    /// Whether deliveries are on.
    pub enabled: bool,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    /// Which events are delivered.
    #[serde(default, deserialize_with = "null_as_default")]
    pub policy_statements: Vec<PolicyStatement>,
}

impl WebhookConfig {
    /// Resource schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "url",
                Attribute::required_string().with_description("URL of the remote webhook"),
            )
            .with_attribute(
                "secret",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("If set, deliveries are signed with this secret"),
            )
            .with_attribute(
                "enabled",
                Attribute::required_bool().with_description("Whether the webhook is enabled"),
            )
            .with_attribute("name", Attribute::optional_string())
            .with_attribute("tags", Attribute::optional_string_set())
            .with_block("policy_statements", PolicyStatement::schema())
    }

    /// Data source schema: `id` in, everything else out.
    pub fn lookup_schema() -> Schema {
        let resource = Self::schema();
        Schema {
            version: resource.version,
            block: resource
                .block
                .into_computed()
                .with_attribute("id", Attribute::required_string()),
        }
    }

    /// Every policy statement must be well-formed.
    pub fn validate(&self) -> ProviderResult<()> {
        self.policy_statements
            .iter()
            .try_for_each(PolicyStatement::validate)
    }
}
