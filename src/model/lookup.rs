//! State of the read-only project and feature flag lookups.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{null_as_default, single_block};
use crate::schema::{Attribute, AttributeType, AttributeFlags, Block, NestedBlock, Schema};

/// `launchdarkly_project` data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLookup {
    /// Same as `key`.
    #[serde(default)]
    pub id: Option<String>,
    /// Project key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
}

impl ProjectLookup {
    /// Data source schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute(
                "tags",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::computed()),
            )
    }
}

/// One variation as exposed by the flag lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationState {
    /// Strings verbatim, other JSON values in compact form.
    pub value: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Client-side SDK visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientSideAvailabilityState {
    /// Visible to SDKs keyed by environment id.
    #[serde(default)]
    pub using_environment_id: bool,
    /// Visible to SDKs keyed by mobile key.
    #[serde(default)]
    pub using_mobile_key: bool,
}

/// `launchdarkly_feature_flag` data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagLookup {
    /// `project_key/key`.
    #[serde(default)]
    pub id: Option<String>,
    /// Owning project.
    pub project_key: String,
    /// Flag key.
    pub key: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Marked as temporary.
    #[serde(default)]
    pub temporary: Option<bool>,
    /// Tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    /// Possible values.
    #[serde(default, deserialize_with = "null_as_default")]
    pub variations: Vec<VariationState>,
    /// Client-side visibility.
    #[serde(default, deserialize_with = "single_block")]
    pub client_side_availability: Option<ClientSideAvailabilityState>,
}

impl FeatureFlagLookup {
    /// Data source schema.
    pub fn schema() -> Schema {
        let variations = Block::new()
            .with_attribute("value", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string());
        let availability = Block::new()
            .with_attribute("using_environment_id", Attribute::computed_bool())
            .with_attribute("using_mobile_key", Attribute::computed_bool());

        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("project_key", Attribute::required_string())
            .with_attribute("key", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("temporary", Attribute::computed_bool())
            .with_attribute(
                "tags",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::computed()),
            )
            .with_block("variations", NestedBlock::list(variations).with_computed())
            .with_block(
                "client_side_availability",
                NestedBlock::single(availability).with_computed(),
            )
    }
}
