//! Wire shapes of the LaunchDarkly REST API (v2).
//!
//! Request types skip empty lists because the API distinguishes an absent
//! field from an empty one; response types default absent lists to empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A policy statement attached to a webhook or access policy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    /// Resource specifiers the statement covers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Resource specifiers the statement excludes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_resources: Vec<String>,
    /// Actions the statement covers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Actions the statement excludes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_actions: Vec<String>,
    /// `allow` or `deny`.
    pub effect: String,
}

/// Body of `POST /webhooks`. Tags are not accepted at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    /// Delivery URL.
    pub url: String,
    /// Signing secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Whether payloads are signed with `secret`.
    pub sign: bool,
    /// Whether deliveries are on.
    pub on: bool,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Events delivered.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
}

/// A webhook as returned by the API. The secret is never echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    /// Server-assigned id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Delivery URL.
    pub url: String,
    /// Whether deliveries are on.
    pub on: bool,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Events delivered.
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// A targeting clause. Values are typed JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    /// User attribute tested.
    pub attribute: String,
    /// Operator name, e.g. `in`.
    pub op: String,
    /// Operands.
    #[serde(default)]
    pub values: Vec<Value>,
    /// Invert the match.
    #[serde(default)]
    pub negate: bool,
}

/// One bucket of a percentage rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedVariation {
    /// Variation index.
    pub variation: i64,
    /// Share of users, out of 100000.
    pub weight: i64,
}

/// A percentage rollout across variations, weights in thousandths of a percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    /// Buckets in the order the API lists them.
    pub variations: Vec<WeightedVariation>,
    /// User attribute used for bucketing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

/// Either a fixed variation or a rollout, as used by the fallthrough.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariationOrRollout {
    /// Fixed variation index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<i64>,
    /// Percentage rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
}

/// A flag targeting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Fixed variation index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation: Option<i64>,
    /// Percentage rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<Rollout>,
    /// All must match.
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

/// Individually targeted users for one variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// User keys.
    #[serde(default)]
    pub values: Vec<String>,
    /// Variation index served to them.
    pub variation: i64,
}

/// A flag that must evaluate to a given variation first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Key of the prerequisite flag.
    pub key: String,
    /// Variation it must serve.
    pub variation: i64,
}

/// A flag's targeting configuration in one environment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlagConfig {
    /// Targeting on.
    #[serde(default)]
    pub on: bool,
    /// Send full event data.
    #[serde(default)]
    pub track_events: bool,
    /// Variation served while targeting is off.
    #[serde(default)]
    pub off_variation: Option<i64>,
    /// Served when no rule matches.
    #[serde(default)]
    pub fallthrough: Option<VariationOrRollout>,
    /// Targeting rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Individually targeted users.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Prerequisite flags.
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
}

/// One possible value of a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    /// The JSON value served.
    pub value: Value,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Which client-side SDKs may see a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSideAvailability {
    /// Visible to SDKs using the client-side id.
    #[serde(default)]
    pub using_environment_id: bool,
    /// Visible to mobile SDKs.
    #[serde(default)]
    pub using_mobile_key: bool,
}

/// A feature flag, optionally with per-environment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
    /// Flag key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Marked for eventual removal.
    #[serde(default)]
    pub temporary: bool,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Possible values, by index.
    #[serde(default)]
    pub variations: Vec<Variation>,
    /// Client-side SDK visibility.
    #[serde(default)]
    pub client_side_availability: Option<ClientSideAvailability>,
    /// Per-environment configuration, keyed by environment key.
    #[serde(default)]
    pub environments: BTreeMap<String, FeatureFlagConfig>,
}

/// Body of `POST /segments/{project}/{env}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSegmentBody {
    /// Display name.
    pub name: String,
    /// Segment key.
    pub key: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A segment rule: clauses, plus an optional percentage of matching users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSegmentRule {
    /// All must match.
    #[serde(default)]
    pub clauses: Vec<Clause>,
    /// Share of matching users included, out of 100000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    /// User attribute used for bucketing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_by: Option<String>,
}

/// An environment-scoped user segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSegment {
    /// Segment key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Users always included.
    #[serde(default)]
    pub included: Vec<String>,
    /// Users always excluded.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Inclusion rules.
    #[serde(default)]
    pub rules: Vec<UserSegmentRule>,
}

/// A project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A JSON-Patch operation. The provider only ever emits `replace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// Always `replace`.
    pub op: String,
    /// JSON Pointer to the replaced value.
    pub path: String,
    /// New value.
    pub value: Value,
}

impl PatchOperation {
    /// A `replace` of the value at `path`.
    pub fn replace<T: Serialize + ?Sized>(
        path: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            op: "replace".to_string(),
            path: path.into(),
            value: serde_json::to_value(value)?,
        })
    }
}

/// Flag patches are wrapped with an audit-log comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchComment {
    /// Audit-log comment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Operations applied in order.
    pub patch: Vec<PatchOperation>,
}
