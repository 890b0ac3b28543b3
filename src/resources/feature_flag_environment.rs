//! A flag's targeting in one environment.
//!
//! The flag itself is not owned: create and delete only rewrite the
//! environment's configuration inside it. The flag's variation count sizes
//! rollouts and user targets, so every write fetches the flag first.

use tracing::{debug, info, instrument, warn};

use super::{require_present, Observed, Resource, FEATURE_FLAG_ENVIRONMENT};
use crate::api::{FeatureFlag, PatchComment, PatchOperation};
use crate::client::Client;
use crate::error::{ProviderError, ProviderResult};
use crate::identity::{FlagEnvironmentId, FlagId};
use crate::model::FlagEnvironmentConfig;
use crate::schema::Schema;
use crate::{decode, patch};

const PATCH_COMMENT: &str = "Terraform";

/// `launchdarkly_feature_flag_environment`: identified by `project_key/env_key/flag_key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureFlagEnvironmentResource;

async fn fetch_flag(client: &Client, id: &FlagEnvironmentId) -> ProviderResult<FeatureFlag> {
    client
        .get_feature_flag(&id.flag, Some(&id.env_key))
        .await
        .map_err(|err| match err {
            ProviderError::NotFound(msg) => {
                ProviderError::NotFound(format!("cannot find flag {:?}: {}", id.flag.to_string(), msg))
            }
            other => other,
        })
}

async fn apply(client: &Client, flag: &FlagId, operations: Vec<PatchOperation>) -> ProviderResult<()> {
    if operations.is_empty() {
        debug!(%flag, "Nothing to patch");
        return Ok(());
    }
    let body = PatchComment {
        comment: Some(PATCH_COMMENT.to_string()),
        patch: operations,
    };
    client.update_feature_flag(flag, &body).await.map(|_| ())
}

impl FeatureFlagEnvironmentResource {
    async fn write(
        &self,
        client: &Client,
        mut planned: FlagEnvironmentConfig,
    ) -> ProviderResult<FlagEnvironmentConfig> {
        let id = planned.environment_id()?;
        let flag = fetch_flag(client, &id).await?;
        let operations = patch::flag_environment(&planned, flag.variations.len())?;
        apply(client, &id.flag, operations).await?;
        planned.id = Some(id.to_string());
        require_present(self.read(client, &planned).await?, "flag environment")
    }
}

#[async_trait::async_trait]
impl Resource for FeatureFlagEnvironmentResource {
    type State = FlagEnvironmentConfig;

    fn type_name(&self) -> &'static str {
        FEATURE_FLAG_ENVIRONMENT
    }

    fn schema(&self) -> Schema {
        FlagEnvironmentConfig::schema()
    }

    fn validate(&self, state: &FlagEnvironmentConfig) -> ProviderResult<()> {
        state.validate()
    }

    #[instrument(skip_all, fields(flag_id = %planned.flag_id, env_key = %planned.env_key))]
    async fn create(
        &self,
        client: &Client,
        planned: FlagEnvironmentConfig,
    ) -> ProviderResult<FlagEnvironmentConfig> {
        let state = self.write(client, planned).await?;
        info!(id = ?state.id, "Configured flag environment");
        Ok(state)
    }

    #[instrument(skip_all, fields(flag_id = %current.flag_id, env_key = %current.env_key))]
    async fn read(
        &self,
        client: &Client,
        current: &FlagEnvironmentConfig,
    ) -> ProviderResult<Observed<FlagEnvironmentConfig>> {
        let id = current.environment_id()?;
        let found = client
            .get_feature_flag(&id.flag, Some(&id.env_key))
            .await
            .and_then(|flag| decode::flag_environment(&flag, &id));
        match found {
            Ok(mut state) => {
                for (rule, prior) in state.rules.iter_mut().zip(&current.rules) {
                    decode::retain_value_text(&mut rule.clauses, &prior.clauses);
                }
                Ok(Observed::Present(state))
            }
            Err(ProviderError::NotFound(msg)) => {
                warn!(%id, reason = %msg, "failed to find flag environment, removing from state");
                Ok(Observed::Absent)
            }
            Err(err) => Err(err),
        }
    }

    /// Attributes missing from `planned` keep their remote value.
    #[instrument(skip_all, fields(flag_id = %planned.flag_id, env_key = %planned.env_key))]
    async fn update(
        &self,
        client: &Client,
        _prior: &FlagEnvironmentConfig,
        planned: FlagEnvironmentConfig,
    ) -> ProviderResult<FlagEnvironmentConfig> {
        self.write(client, planned).await
    }

    #[instrument(skip_all, fields(flag_id = %current.flag_id, env_key = %current.env_key))]
    async fn delete(&self, client: &Client, current: &FlagEnvironmentConfig) -> ProviderResult<()> {
        let id = current.environment_id()?;
        let flag = match fetch_flag(client, &id).await {
            Ok(flag) => flag,
            Err(ProviderError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };
        if !flag.environments.contains_key(&id.env_key) {
            return Ok(());
        }
        let operations = patch::flag_environment_reset(&id.env_key, flag.variations.len())?;
        apply(client, &id.flag, operations).await?;
        info!(%id, "Reset flag environment");
        Ok(())
    }

    async fn import(&self, client: &Client, id: &str) -> ProviderResult<FlagEnvironmentConfig> {
        let id: FlagEnvironmentId = id.parse()?;
        let flag = fetch_flag(client, &id).await?;
        decode::flag_environment(&flag, &id)
    }
}
