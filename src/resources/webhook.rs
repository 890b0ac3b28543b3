use tracing::{info, instrument, warn};

use super::{keep_created, require_present, Observed, Resource, WEBHOOK};
use crate::client::Client;
use crate::error::{ProviderError, ProviderResult};
use crate::model::WebhookConfig;
use crate::schema::Schema;
use crate::{decode, encode, patch};

/// `launchdarkly_webhook`: identified by its server-assigned id.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookResource;

fn webhook_id(state: &WebhookConfig) -> ProviderResult<&str> {
    state
        .id
        .as_deref()
        .ok_or_else(|| ProviderError::Validation("webhook state has no id".to_string()))
}

#[async_trait::async_trait]
impl Resource for WebhookResource {
    type State = WebhookConfig;

    fn type_name(&self) -> &'static str {
        WEBHOOK
    }

    fn schema(&self) -> Schema {
        WebhookConfig::schema()
    }

    fn validate(&self, state: &WebhookConfig) -> ProviderResult<()> {
        state.validate()
    }

    /// POST accepts no tags, so the full patch follows creation.
    #[instrument(skip_all, fields(url = %planned.url))]
    async fn create(&self, client: &Client, mut planned: WebhookConfig) -> ProviderResult<WebhookConfig> {
        let created = client.create_webhook(&encode::webhook_body(&planned)).await?;
        info!(id = %created.id, "Created webhook");
        planned.id = Some(created.id);
        let prior = planned.clone();
        let result = self.update(client, &prior, planned).await;
        keep_created(&prior, result)
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn read(&self, client: &Client, current: &WebhookConfig) -> ProviderResult<Observed<WebhookConfig>> {
        let id = webhook_id(current)?;
        match client.get_webhook(id).await {
            Ok(hook) => Ok(Observed::Present(decode::webhook(&hook, current.secret.clone())?)),
            Err(ProviderError::NotFound(_)) => {
                warn!(id, "failed to find webhook, removing from state");
                Ok(Observed::Absent)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(id = ?prior.id))]
    async fn update(
        &self,
        client: &Client,
        prior: &WebhookConfig,
        mut planned: WebhookConfig,
    ) -> ProviderResult<WebhookConfig> {
        let id = webhook_id(prior)?.to_string();
        client.update_webhook(&id, &patch::webhook(&planned)?).await?;
        planned.id = Some(id);
        require_present(self.read(client, &planned).await?, "webhook")
    }

    #[instrument(skip_all, fields(id = ?current.id))]
    async fn delete(&self, client: &Client, current: &WebhookConfig) -> ProviderResult<()> {
        match client.delete_webhook(webhook_id(current)?).await {
            Ok(()) | Err(ProviderError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn import(&self, client: &Client, id: &str) -> ProviderResult<WebhookConfig> {
        let hook = client.get_webhook(id).await?;
        decode::webhook(&hook, None)
    }
}
