//! Read-only lookups.
//!
//! Unlike managed resources, a lookup that finds nothing is an error: the
//! configuration asked for something that does not exist.

mod feature_flag;
mod project;
mod segment;
mod webhook;

pub use feature_flag::FeatureFlagDataSource;
pub use project::ProjectDataSource;
pub use segment::SegmentDataSource;
pub use webhook::WebhookDataSource;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::Client;
use crate::error::ProviderResult;
use crate::schema::{Diagnostic, Schema};
use crate::validation;

/// `launchdarkly_webhook`
pub const WEBHOOK: &str = "launchdarkly_webhook";
/// `launchdarkly_segment`
pub const SEGMENT: &str = "launchdarkly_segment";
/// `launchdarkly_project`
pub const PROJECT: &str = "launchdarkly_project";
/// `launchdarkly_feature_flag`
pub const FEATURE_FLAG: &str = "launchdarkly_feature_flag";

/// A read-only lookup kind.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// The keys a lookup is configured with.
    type Query: DeserializeOwned + Send + Sync;
    /// Everything the lookup exposes.
    type State: Serialize + Send;

    /// Type name served to the plugin host.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Fetch and decode.
    async fn read(&self, client: &Client, query: Self::Query) -> ProviderResult<Self::State>;
}

/// Schema diagnostics for a lookup configuration.
pub fn validate_config<D: DataSource>(data_source: &D, config: &Value) -> Vec<Diagnostic> {
    validation::validate(&data_source.schema(), config)
}

/// Untyped read.
pub async fn read<D: DataSource>(data_source: &D, client: &Client, config: Value) -> ProviderResult<Value> {
    let query: D::Query = serde_json::from_value(config)?;
    let state = data_source.read(client, query).await?;
    Ok(serde_json::to_value(state)?)
}
