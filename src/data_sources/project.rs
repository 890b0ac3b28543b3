use tracing::instrument;

use super::{DataSource, PROJECT};
use crate::client::Client;
use crate::decode;
use crate::error::ProviderResult;
use crate::model::ProjectLookup;
use crate::schema::Schema;

/// `launchdarkly_project` lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectDataSource;

#[async_trait::async_trait]
impl DataSource for ProjectDataSource {
    type Query = ProjectLookup;
    type State = ProjectLookup;

    fn type_name(&self) -> &'static str {
        PROJECT
    }

    fn schema(&self) -> Schema {
        ProjectLookup::schema()
    }

    #[instrument(skip_all, fields(key = %query.key))]
    async fn read(&self, client: &Client, query: ProjectLookup) -> ProviderResult<ProjectLookup> {
        let project = client.get_project(&query.key).await?;
        Ok(decode::project(&project))
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
    async fn test_reads_project() {
        let mock = MockApi::new();
        mock.insert_project("default", "Default project", &["terraform", "managed"])
            .await;
        let client = Client::new(Arc::new(mock), RetrySettings::immediate());

        let state = crate::data_sources::read(&ProjectDataSource, &client, json!({"key": "default"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "default");
        assert_eq!(state["name"], "Default project");
        assert_eq!(state["tags"], json!(["managed", "terraform"]));
    }

    #[tokio::test]
    async fn test_missing_project() {
        let client = Client::new(Arc::new(MockApi::new()), RetrySettings::immediate());
        let err = crate::data_sources::read(&ProjectDataSource, &client, json!({"key": "nonexistent-project-key"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err
            .message()
            .starts_with("failed to get project with key \"nonexistent-project-key\": 404 Not Found"));
    }
}
