//! Typed declarative state, one struct per resource and data source.
//!
//! Each struct is the single (de)serialization boundary against the plugin
//! host's attribute tree and carries its own schema and cross-field checks.

mod flag_environment;
mod lookup;
mod policy;
mod segment;
mod targeting;
mod webhook;

pub use flag_environment::FlagEnvironmentConfig;
pub use lookup::{ClientSideAvailabilityState, FeatureFlagLookup, ProjectLookup, VariationState};
pub use policy::{Effect, PolicyStatement};
pub use segment::{SegmentConfig, SegmentRule};
pub use targeting::{
    validate_rollout, Clause, Fallthrough, FlagRule, Operator, Prerequisite, UserTarget, ValueType,
    ROLLOUT_TOTAL,
};
pub use webhook::WebhookConfig;

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` like an omitted attribute.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrList<T> {
    List(Vec<T>),
    One(T),
}

/// A single nested block arrives either as an object or as a list of at most one.
pub(crate) fn single_block<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrList<T>>::deserialize(deserializer)? {
        None => None,
        Some(OneOrList::One(item)) => Some(item),
        Some(OneOrList::List(items)) => items.into_iter().next(),
    })
}
