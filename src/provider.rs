//! The LaunchDarkly provider as the plugin host sees it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::api::LaunchDarklyApi;
use crate::client::Client;
use crate::config::ProviderConfig;
use crate::data_sources::{
    self, DataSource, FeatureFlagDataSource, ProjectDataSource, SegmentDataSource,
    WebhookDataSource,
};
use crate::error::{ProviderError, ProviderResult};
use crate::resources::{
    self, FeatureFlagEnvironmentResource, Resource, SegmentResource, WebhookResource,
};
use crate::retry::RetrySettings;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation;

/// Serves `launchdarkly_webhook`, `launchdarkly_segment` and
/// `launchdarkly_feature_flag_environment`, plus the webhook, segment,
/// project and feature flag lookups.
///
/// Every remote operation fails with [`ProviderError::Configuration`] until
/// [`ProviderService::configure`] has succeeded.
pub struct LaunchDarklyProvider {
    client: RwLock<Option<Client>>,
    api_override: Option<(Arc<dyn LaunchDarklyApi>, RetrySettings)>,
}

impl Default for LaunchDarklyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LaunchDarklyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchDarklyProvider")
            .field("api_override", &self.api_override.is_some())
            .finish_non_exhaustive()
    }
}

impl LaunchDarklyProvider {
    /// A provider that talks to the LaunchDarkly REST API once configured.
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            api_override: None,
        }
    }

    /// A provider that talks to `api` once configured, retrying per `retry`.
    pub fn with_api(api: impl LaunchDarklyApi + 'static, retry: RetrySettings) -> Self {
        Self {
            client: RwLock::new(None),
            api_override: Some((Arc::new(api), retry)),
        }
    }

    /// A provider that is already configured with `client`.
    pub fn with_client(client: Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            api_override: None,
        }
    }

    async fn client(&self) -> ProviderResult<Client> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("the provider must be configured before use".to_string())
        })
    }

    fn connect(&self, config: Value) -> ProviderResult<Client> {
        let settings = ProviderConfig::from_value(config)?.resolve()?;
        debug!(api_host = %settings.api_host, timeout_secs = settings.http_timeout.as_secs(), "Resolved provider settings");
        match &self.api_override {
            Some((api, retry)) => Ok(Client::new(Arc::clone(api), retry.clone())),
            None => Client::from_settings(&settings),
        }
    }
}

fn unknown_resource(kind: &str, name: &str) -> ProviderError {
    ProviderError::UnknownResource(format!("{} {:?} is not served by this provider", kind, name))
}

fn log_outcome<T>(operation: &str, type_name: &str, result: &ProviderResult<T>) {
    match result {
        Ok(_) => info!(resource_type = type_name, "{} completed successfully", operation),
        Err(e) => error!(resource_type = type_name, error = %e, "{} failed", operation),
    }
}

#[async_trait::async_trait]
impl ProviderService for LaunchDarklyProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(ProviderConfig::schema())
            .with_resource(resources::WEBHOOK, WebhookResource.schema())
            .with_resource(resources::SEGMENT, SegmentResource.schema())
            .with_resource(
                resources::FEATURE_FLAG_ENVIRONMENT,
                FeatureFlagEnvironmentResource.schema(),
            )
            .with_data_source(data_sources::WEBHOOK, WebhookDataSource.schema())
            .with_data_source(data_sources::SEGMENT, SegmentDataSource.schema())
            .with_data_source(data_sources::PROJECT, ProjectDataSource.schema())
            .with_data_source(data_sources::FEATURE_FLAG, FeatureFlagDataSource.schema())
    }

    async fn validate_provider_config(&self, config: Value) -> ProviderResult<Vec<Diagnostic>> {
        Ok(validation::validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> ProviderResult<Vec<Diagnostic>> {
        let diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if !diagnostics.is_empty() {
            return Ok(diagnostics);
        }
        match self.connect(config) {
            Ok(client) => {
                *self.client.write().await = Some(client);
                info!("Provider configured");
                Ok(Vec::new())
            }
            Err(e) => {
                error!(error = %e, "Configure failed");
                Ok(vec![e.into()])
            }
        }
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> ProviderResult<Vec<Diagnostic>> {
        match resource_type {
            resources::WEBHOOK => Ok(resources::validate_config(&WebhookResource, config)),
            resources::SEGMENT => Ok(resources::validate_config(&SegmentResource, config)),
            resources::FEATURE_FLAG_ENVIRONMENT => Ok(resources::validate_config(
                &FeatureFlagEnvironmentResource,
                config,
            )),
            other => Err(unknown_resource("resource", other)),
        }
    }

    #[instrument(skip(self, prior_state, proposed_state))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> ProviderResult<PlanResult> {
        debug!(is_create = prior_state.is_none(), "Plan called");
        let result = match resource_type {
            resources::WEBHOOK => resources::plan(&WebhookResource, prior_state, proposed_state),
            resources::SEGMENT => resources::plan(&SegmentResource, prior_state, proposed_state),
            resources::FEATURE_FLAG_ENVIRONMENT => {
                resources::plan(&FeatureFlagEnvironmentResource, prior_state, proposed_state)
            }
            other => Err(unknown_resource("resource", other)),
        };
        if let Ok(plan) = &result {
            debug!(
                changes = plan.changes.len(),
                requires_replace = plan.requires_replace,
                "Plan completed"
            );
        }
        result
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> ProviderResult<Value> {
        let client = self.client().await?;
        let result = match resource_type {
            resources::WEBHOOK => resources::create(&WebhookResource, &client, planned_state).await,
            resources::SEGMENT => resources::create(&SegmentResource, &client, planned_state).await,
            resources::FEATURE_FLAG_ENVIRONMENT => {
                resources::create(&FeatureFlagEnvironmentResource, &client, planned_state).await
            }
            other => Err(unknown_resource("resource", other)),
        };
        log_outcome("Create", resource_type, &result);
        result
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> ProviderResult<Value> {
        let client = self.client().await?;
        match resource_type {
            resources::WEBHOOK => resources::read(&WebhookResource, &client, current_state).await,
            resources::SEGMENT => resources::read(&SegmentResource, &client, current_state).await,
            resources::FEATURE_FLAG_ENVIRONMENT => {
                resources::read(&FeatureFlagEnvironmentResource, &client, current_state).await
            }
            other => Err(unknown_resource("resource", other)),
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> ProviderResult<Value> {
        let client = self.client().await?;
        let result = match resource_type {
            resources::WEBHOOK => {
                resources::update(&WebhookResource, &client, prior_state, planned_state).await
            }
            resources::SEGMENT => {
                resources::update(&SegmentResource, &client, prior_state, planned_state).await
            }
            resources::FEATURE_FLAG_ENVIRONMENT => {
                resources::update(
                    &FeatureFlagEnvironmentResource,
                    &client,
                    prior_state,
                    planned_state,
                )
                .await
            }
            other => Err(unknown_resource("resource", other)),
        };
        log_outcome("Update", resource_type, &result);
        result
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> ProviderResult<()> {
        let client = self.client().await?;
        let result = match resource_type {
            resources::WEBHOOK => resources::delete(&WebhookResource, &client, current_state).await,
            resources::SEGMENT => resources::delete(&SegmentResource, &client, current_state).await,
            resources::FEATURE_FLAG_ENVIRONMENT => {
                resources::delete(&FeatureFlagEnvironmentResource, &client, current_state).await
            }
            other => Err(unknown_resource("resource", other)),
        };
        log_outcome("Delete", resource_type, &result);
        result
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> ProviderResult<Vec<ImportedResource>> {
        let client = self.client().await?;
        let result = match resource_type {
            resources::WEBHOOK => resources::import(&WebhookResource, &client, id).await,
            resources::SEGMENT => resources::import(&SegmentResource, &client, id).await,
            resources::FEATURE_FLAG_ENVIRONMENT => {
                resources::import(&FeatureFlagEnvironmentResource, &client, id).await
            }
            other => Err(unknown_resource("resource", other)),
        };
        log_outcome("Import", resource_type, &result);
        result
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> ProviderResult<Vec<Diagnostic>> {
        match data_source_type {
            data_sources::WEBHOOK => Ok(data_sources::validate_config(&WebhookDataSource, &config)),
            data_sources::SEGMENT => Ok(data_sources::validate_config(&SegmentDataSource, &config)),
            data_sources::PROJECT => Ok(data_sources::validate_config(&ProjectDataSource, &config)),
            data_sources::FEATURE_FLAG => {
                Ok(data_sources::validate_config(&FeatureFlagDataSource, &config))
            }
            other => Err(unknown_resource("data source", other)),
        }
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> ProviderResult<Value> {
        let client = self.client().await?;
        let result = match data_source_type {
            data_sources::WEBHOOK => data_sources::read(&WebhookDataSource, &client, config).await,
            data_sources::SEGMENT => data_sources::read(&SegmentDataSource, &client, config).await,
            data_sources::PROJECT => data_sources::read(&ProjectDataSource, &client, config).await,
            data_sources::FEATURE_FLAG => {
                data_sources::read(&FeatureFlagDataSource, &client, config).await
            }
            other => Err(unknown_resource("data source", other)),
        };
        log_outcome("Read data source", data_source_type, &result);
        result
    }
}
