use tracing::{info, instrument, warn};

use super::{keep_created, require_present, Observed, Resource, SEGMENT};
use crate::client::Client;
use crate::error::{ProviderError, ProviderResult};
use crate::identity::SegmentId;
use crate::model::SegmentConfig;
use crate::schema::Schema;
use crate::{decode, encode, patch};

/// `launchdarkly_segment`: identified by `project_key/env_key/key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentResource;

#[async_trait::async_trait]
impl Resource for SegmentResource {
    type State = SegmentConfig;

    fn type_name(&self) -> &'static str {
        SEGMENT
    }

    fn schema(&self) -> Schema {
        SegmentConfig::schema()
    }

    fn validate(&self, state: &SegmentConfig) -> ProviderResult<()> {
        state.validate()
    }

    /// POST takes name, key, description and tags; the rest arrives by patch.
    #[instrument(skip_all, fields(id = %planned.segment_id()))]
    async fn create(&self, client: &Client, mut planned: SegmentConfig) -> ProviderResult<SegmentConfig> {
        client
            .create_segment(&planned.project_key, &planned.env_key, &encode::segment_body(&planned))
            .await?;
        let id = planned.segment_id();
        info!(%id, "Created segment");
        planned.id = Some(id.to_string());
        let prior = planned.clone();
        let result = self.update(client, &prior, planned).await;
        keep_created(&prior, result)
    }

    #[instrument(skip_all, fields(id = %current.segment_id()))]
    async fn read(&self, client: &Client, current: &SegmentConfig) -> ProviderResult<Observed<SegmentConfig>> {
        let id = current.segment_id();
        match client.get_segment(&id).await {
            Ok(segment) => {
                let mut state = decode::segment(&segment, &id)?;
                for (rule, prior) in state.rules.iter_mut().zip(&current.rules) {
                    decode::retain_value_text(&mut rule.clauses, &prior.clauses);
                }
                Ok(Observed::Present(state))
            }
            Err(ProviderError::NotFound(_)) => {
                warn!(%id, "failed to find segment, removing from state");
                Ok(Observed::Absent)
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip_all, fields(id = %prior.segment_id()))]
    async fn update(
        &self,
        client: &Client,
        prior: &SegmentConfig,
        mut planned: SegmentConfig,
    ) -> ProviderResult<SegmentConfig> {
        let id = prior.segment_id();
        client.update_segment(&id, &patch::segment(&planned)?).await?;
        planned.id = Some(id.to_string());
        require_present(self.read(client, &planned).await?, "segment")
    }

    #[instrument(skip_all, fields(id = %current.segment_id()))]
    async fn delete(&self, client: &Client, current: &SegmentConfig) -> ProviderResult<()> {
        match client.delete_segment(&current.segment_id()).await {
            Ok(()) | Err(ProviderError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn import(&self, client: &Client, id: &str) -> ProviderResult<SegmentConfig> {
        let id: SegmentId = id.parse()?;
        let segment = client.get_segment(&id).await?;
        decode::segment(&segment, &id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operator;
    use crate::retry::RetrySettings;
    use crate::testing::{MockApi, MockOp};
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn client(mock: &MockApi) -> Client {
        Client::new(Arc::new(mock.clone()), RetrySettings::immediate())
    }

    fn config(value: serde_json::Value) -> SegmentConfig {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_patch_rules() {
        let mock = MockApi::new();
        let planned = config(json!({
            "project_key": "default",
            "env_key": "test",
            "key": "beta",
            "name": "Beta users",
            "tags": ["terraform"],
            "included": ["user1"],
            "rules": [{
                "clauses": [{"attribute": "email", "op": "endsWith", "values": ["@example.com"]}],
                "weight": 50000,
                "bucket_by": "country",
            }],
        }));

        let state = assert_ok!(SegmentResource.create(&client(&mock), planned).await);

        assert_eq!(state.id.as_deref(), Some("default/test/beta"));
        assert_eq!(state.included, vec!["user1"]);
        assert_eq!(state.rules.len(), 1);
        assert_eq!(state.rules[0].clauses[0].op, Operator::EndsWith);
        assert_eq!(state.rules[0].weight, Some(50000));

        let patches = mock.patches(MockOp::PatchSegment).await;
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].len(), 6);
    }

    #[tokio::test]
    async fn test_create_existing_key_fails() {
        let mock = MockApi::new();
        let id = SegmentId::new("default", "test", "beta");
        mock.insert_segment(&id, "Beta").await;
        let planned = config(json!({"project_key": "default", "env_key": "test", "key": "beta", "name": "Beta"}));

        let err = assert_err!(SegmentResource.create(&client(&mock), planned).await);
        assert!(matches!(err, ProviderError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_read_missing_is_absent() {
        let mock = MockApi::new();
        let state = config(json!({"project_key": "default", "env_key": "test", "key": "gone", "name": "Gone"}));
        let observed = SegmentResource.read(&client(&mock), &state).await.unwrap();
        assert_eq!(observed, Observed::Absent);
    }

    #[tokio::test]
    async fn test_import_parses_identity() {
        let mock = MockApi::new();
        mock.insert_segment(&SegmentId::new("default", "test", "beta"), "Beta").await;

        let state = SegmentResource.import(&client(&mock), "default/test/beta").await.unwrap();
        assert_eq!(state.project_key, "default");
        assert_eq!(state.env_key, "test");
        assert_eq!(state.name, "Beta");

        let err = assert_err!(SegmentResource.import(&client(&mock), "default/beta").await);
        assert!(matches!(err, ProviderError::InvalidIdentity(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let mock = MockApi::new();
        let id = SegmentId::new("default", "test", "beta");
        mock.insert_segment(&id, "Beta").await;
        let state = config(json!({"project_key": "default", "env_key": "test", "key": "beta", "name": "Beta"}));

        assert_ok!(SegmentResource.delete(&client(&mock), &state).await);
        assert!(mock.segment(&id).await.is_none());
        assert_ok!(SegmentResource.delete(&client(&mock), &state).await);
    }

    #[tokio::test]
    async fn test_failed_patch_after_post_keeps_id() {
        let mock = MockApi::new();
        mock.fail_next(MockOp::PatchSegment, 500, 1).await;
        let planned = config(json!({
            "project_key": "default",
            "env_key": "test",
            "key": "beta",
            "name": "Beta users",
            "included": ["user1"],
        }));

        let err = assert_err!(SegmentResource.create(&client(&mock), planned.clone()).await);
        assert!(!matches!(err, ProviderError::Conflict(_)));
        let state = err.partial_state().cloned().unwrap();
        assert_eq!(state["id"], "default/test/beta");

        let tracked = config(state);
        let updated = assert_ok!(SegmentResource.update(&client(&mock), &tracked, planned).await);
        assert_eq!(updated.included, vec!["user1"]);
        assert_eq!(mock.call_count(MockOp::PostSegment).await, 1);
    }
}
