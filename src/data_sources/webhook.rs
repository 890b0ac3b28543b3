use serde::Deserialize;
use tracing::instrument;

use super::{DataSource, WEBHOOK};
use crate::client::Client;
use crate::decode;
use crate::error::ProviderResult;
use crate::model::WebhookConfig;
use crate::schema::Schema;

/// Lookup input.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookQuery {
    /// Server-assigned id.
    pub id: String,
}

/// `launchdarkly_webhook` lookup. The secret is never populated.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookDataSource;

#[async_trait::async_trait]
impl DataSource for WebhookDataSource {
    type Query = WebhookQuery;
    type State = WebhookConfig;

    fn type_name(&self) -> &'static str {
        WEBHOOK
    }

    fn schema(&self) -> Schema {
        WebhookConfig::lookup_schema()
    }

    #[instrument(skip_all, fields(id = %query.id))]
    async fn read(&self, client: &Client, query: WebhookQuery) -> ProviderResult<WebhookConfig> {
        let hook = client.get_webhook(&query.id).await?;
        decode::webhook(&hook, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::retry::RetrySettings;
    use crate::testing::MockApi;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_webhook_is_an_error() {
        let mock = MockApi::new();
        let client = Client::new(Arc::new(mock), RetrySettings::immediate());

        let err = crate::data_sources::read(&WebhookDataSource, &client, json!({"id": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err
            .message()
            .starts_with("failed to get webhook with id \"nope\": 404 Not Found:"));
    }

    #[tokio::test]
    async fn test_reads_webhook() {
        let mock = MockApi::new();
        let hook = mock.insert_webhook("https://example.com/hook", true).await;
        let client = Client::new(Arc::new(mock), RetrySettings::immediate());

        let state = crate::data_sources::read(&WebhookDataSource, &client, json!({"id": hook.id}))
            .await
            .unwrap();
        assert_eq!(state["url"], "https://example.com/hook");
        assert_eq!(state["enabled"], true);
        assert!(state["secret"].is_null());
    }
}
