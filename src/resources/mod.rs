//! Managed resources.
//!
//! Each resource reconciles one typed declarative state against the remote.
//! The functions at the bottom of this module are the untyped entry points
//! the provider dispatches to; they parse attribute trees into the
//! resource's state, validate, call the typed operation and serialize back.

mod feature_flag_environment;
mod segment;
mod webhook;

pub use feature_flag_environment::FeatureFlagEnvironmentResource;
pub use segment::SegmentResource;
pub use webhook::WebhookResource;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::Client;
use crate::error::{ProviderError, ProviderResult};
use crate::schema::{Diagnostic, Schema};
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

/// `launchdarkly_webhook`
pub const WEBHOOK: &str = "launchdarkly_webhook";
/// `launchdarkly_segment`
pub const SEGMENT: &str = "launchdarkly_segment";
/// `launchdarkly_feature_flag_environment`
pub const FEATURE_FLAG_ENVIRONMENT: &str = "launchdarkly_feature_flag_environment";

/// What a read found.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed<T> {
    /// The remote object exists.
    Present(T),
    /// The remote object is gone; drop it from tracking.
    Absent,
}

impl<T> Observed<T> {
    /// The state, if present.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(state) => Some(state),
            Self::Absent => None,
        }
    }
}

/// A managed resource kind.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Typed declarative state.
    type State: Serialize + DeserializeOwned + Send + Sync;

    /// Type name served to the plugin host.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Cross-field checks beyond the schema.
    fn validate(&self, state: &Self::State) -> ProviderResult<()>;

    /// Create the remote object; returns the refreshed state.
    async fn create(&self, client: &Client, planned: Self::State) -> ProviderResult<Self::State>;

    /// Refresh from the remote.
    async fn read(&self, client: &Client, current: &Self::State) -> ProviderResult<Observed<Self::State>>;

    /// Apply `planned`; returns the refreshed state.
    async fn update(
        &self,
        client: &Client,
        prior: &Self::State,
        planned: Self::State,
    ) -> ProviderResult<Self::State>;

    /// Remove the remote object. Already gone is success.
    async fn delete(&self, client: &Client, current: &Self::State) -> ProviderResult<()>;

    /// Load state for an existing remote object.
    async fn import(&self, client: &Client, id: &str) -> ProviderResult<Self::State>;
}

/// A read right after a write must find the object.
pub(crate) fn require_present<T>(observed: Observed<T>, what: &str) -> ProviderResult<T> {
    observed
        .into_option()
        .ok_or_else(|| ProviderError::NotFound(format!("{} disappeared after write", what)))
}

/// Once the remote object exists a failed follow-up still hands back its id.
pub(crate) fn keep_created<T: Serialize>(created: &T, result: ProviderResult<T>) -> ProviderResult<T> {
    result.map_err(|err| match serde_json::to_value(created) {
        Ok(state) => ProviderError::partially_created(state, err),
        Err(_) => err,
    })
}

fn parse<R: Resource>(value: Value) -> ProviderResult<R::State> {
    Ok(serde_json::from_value(value)?)
}

fn render<T: Serialize>(state: &T) -> ProviderResult<Value> {
    Ok(serde_json::to_value(state)?)
}

/// Parse then re-serialize so defaults are filled in and block shapes agree.
fn normalize<R: Resource>(value: Value) -> ProviderResult<Value> {
    render(&parse::<R>(value)?)
}

/// Schema diagnostics first; typed checks only once the tree is well-formed.
pub fn validate_config<R: Resource>(resource: &R, config: Value) -> Vec<Diagnostic> {
    let diagnostics = validation::validate(&resource.schema(), &config);
    if !diagnostics.is_empty() {
        return diagnostics;
    }
    match parse::<R>(config).and_then(|state| resource.validate(&state)) {
        Ok(()) => Vec::new(),
        Err(err) => vec![err.into()],
    }
}

/// Diff prior and proposed state in the resource's schema.
pub fn plan<R: Resource>(
    resource: &R,
    prior: Option<Value>,
    proposed: Value,
) -> ProviderResult<PlanResult> {
    let proposed = normalize::<R>(proposed)?;
    let prior = prior
        .filter(|value| !value.is_null())
        .map(normalize::<R>)
        .transpose()?;
    Ok(crate::plan::plan(&resource.schema(), prior.as_ref(), &proposed))
}

/// Untyped create.
pub async fn create<R: Resource>(resource: &R, client: &Client, planned: Value) -> ProviderResult<Value> {
    let planned = parse::<R>(planned)?;
    resource.validate(&planned)?;
    render(&resource.create(client, planned).await?)
}

/// Untyped read. `Value::Null` means absent.
pub async fn read<R: Resource>(resource: &R, client: &Client, current: Value) -> ProviderResult<Value> {
    let current = parse::<R>(current)?;
    match resource.read(client, &current).await? {
        Observed::Present(state) => render(&state),
        Observed::Absent => Ok(Value::Null),
    }
}

/// Untyped update.
pub async fn update<R: Resource>(
    resource: &R,
    client: &Client,
    prior: Value,
    planned: Value,
) -> ProviderResult<Value> {
    let prior = parse::<R>(prior)?;
    let planned = parse::<R>(planned)?;
    resource.validate(&planned)?;
    render(&resource.update(client, &prior, planned).await?)
}

/// Untyped delete.
pub async fn delete<R: Resource>(resource: &R, client: &Client, current: Value) -> ProviderResult<()> {
    let current = parse::<R>(current)?;
    resource.delete(client, &current).await
}

/// Untyped import.
pub async fn import<R: Resource>(
    resource: &R,
    client: &Client,
    id: &str,
) -> ProviderResult<Vec<ImportedResource>> {
    let state = resource.import(client, id).await?;
    Ok(vec![ImportedResource::new(resource.type_name(), render(&state)?)])
}
