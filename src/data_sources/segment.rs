use serde::Deserialize;
use tracing::instrument;

use super::{DataSource, SEGMENT};
use crate::client::Client;
use crate::decode;
use crate::error::ProviderResult;
use crate::identity::SegmentId;
use crate::model::SegmentConfig;
use crate::schema::Schema;

/// Lookup input.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentQuery {
    /// Owning project.
    pub project_key: String,
    /// Owning environment.
    pub env_key: String,
    /// Segment key.
    pub key: String,
}

/// `launchdarkly_segment` lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentDataSource;

#[async_trait::async_trait]
impl DataSource for SegmentDataSource {
    type Query = SegmentQuery;
    type State = SegmentConfig;

    fn type_name(&self) -> &'static str {
        SEGMENT
    }

    fn schema(&self) -> Schema {
        SegmentConfig::lookup_schema()
    }

    #[instrument(skip_all, fields(project_key = %query.project_key, env_key = %query.env_key, key = %query.key))]
    async fn read(&self, client: &Client, query: SegmentQuery) -> ProviderResult<SegmentConfig> {
        let id = SegmentId::new(query.project_key, query.env_key, query.key);
        let segment = client.get_segment(&id).await?;
        decode::segment(&segment, &id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetrySettings;
    use crate::testing::MockApi;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reads_segment() {
        let mock = MockApi::new();
        mock.insert_segment(&SegmentId::new("default", "test", "beta"), "Beta users")
            .await;
        let client = Client::new(Arc::new(mock), RetrySettings::immediate());

        let query = SegmentQuery {
            project_key: "default".into(),
            env_key: "test".into(),
            key: "beta".into(),
        };
        let state = SegmentDataSource.read(&client, query).await.unwrap();
        assert_eq!(state.id.as_deref(), Some("default/test/beta"));
        assert_eq!(state.name, "Beta users");
    }
}
