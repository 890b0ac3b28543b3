use tracing::instrument;

use super::{DataSource, FEATURE_FLAG};
use crate::client::Client;
use crate::decode;
use crate::error::ProviderResult;
use crate::identity::FlagId;
use crate::model::FeatureFlagLookup;
use crate::schema::Schema;

/// `launchdarkly_feature_flag` lookup. Environment configuration is not exposed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureFlagDataSource;

#[async_trait::async_trait]
impl DataSource for FeatureFlagDataSource {
    type Query = FeatureFlagLookup;
    type State = FeatureFlagLookup;

    fn type_name(&self) -> &'static str {
        FEATURE_FLAG
    }

    fn schema(&self) -> Schema {
        FeatureFlagLookup::schema()
    }

    #[instrument(skip_all, fields(project_key = %query.project_key, key = %query.key))]
    async fn read(&self, client: &Client, query: FeatureFlagLookup) -> ProviderResult<FeatureFlagLookup> {
        let id = FlagId::new(query.project_key, query.key);
        let flag = client.get_feature_flag(&id, None).await?;
        Ok(decode::feature_flag(&flag, &id))
    }
}
