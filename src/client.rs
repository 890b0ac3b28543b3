//! The collaborator as the reconcilers use it.
//!
//! [`Client`] puts every call behind the rate-limit policy, puts every PATCH
//! behind the conflict policy as well, and maps [`ApiError`] into the
//! provider's error taxonomy.

use std::future::Future;
use std::sync::Arc;

use crate::api::{
    ApiError, ApiResult, FeatureFlag, HttpApi, LaunchDarklyApi, PatchComment, PatchOperation,
    Project, UserSegment, UserSegmentBody, Webhook, WebhookBody,
};
use crate::config::ClientSettings;
use crate::error::{Operation, ProviderError, ProviderResult};
use crate::identity::{FlagId, SegmentId};
use crate::retry::{ConflictRetry, RateLimitRetry, RetrySettings};

/// Retrying, error-mapping front of a [`LaunchDarklyApi`].
#[derive(Clone)]
pub struct Client {
    api: Arc<dyn LaunchDarklyApi>,
    retry: RetrySettings,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("retry", &self.retry).finish_non_exhaustive()
    }
}

impl Client {
    /// Wrap an API implementation.
    pub fn new(api: Arc<dyn LaunchDarklyApi>, retry: RetrySettings) -> Self {
        Self { api, retry }
    }

    /// Connect to the real service.
    pub fn from_settings(settings: &ClientSettings) -> ProviderResult<Self> {
        let api = HttpApi::new(settings)?;
        Ok(Self::new(Arc::new(api), settings.retry.clone()))
    }

    async fn rate_limited<T, F, Fut>(&self, op: &str, call: F) -> ApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        RateLimitRetry::new(&self.retry).run(op, call).await
    }

    async fn patched<T, R, RFut, F, Fut>(&self, op: &str, refresh: R, call: F) -> ApiResult<T>
    where
        R: Fn() -> RFut,
        RFut: Future<Output = ApiResult<()>>,
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let limiter = RateLimitRetry::new(&self.retry);
        ConflictRetry::new(&self.retry)
            .run(op, || limiter.run(op, &refresh), || limiter.run(op, &call))
            .await
    }

    /// Creation has nothing to re-read between conflict retries.
    async fn created<T, F, Fut>(&self, op: &str, call: F) -> ApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        self.patched(op, || async { Ok(()) }, call).await
    }

    /// Fetch a webhook.
    pub async fn get_webhook(&self, id: &str) -> ProviderResult<Webhook> {
        self.rate_limited("get webhook", || self.api.get_webhook(id))
            .await
            .map_err(|e| map_error(Operation::Read, &webhook_resource(id), e))
    }

    /// Create a webhook.
    pub async fn create_webhook(&self, body: &WebhookBody) -> ProviderResult<Webhook> {
        self.created("create webhook", || self.api.post_webhook(body))
            .await
            .map_err(|e| map_error(Operation::Create, &format!("webhook {:?}", body.url), e))
    }

    /// Patch a webhook.
    pub async fn update_webhook(&self, id: &str, patch: &[PatchOperation]) -> ProviderResult<Webhook> {
        let api = &*self.api;
        self.patched(
            "update webhook",
            move || async move { api.get_webhook(id).await.map(|_| ()) },
            || api.patch_webhook(id, patch),
        )
        .await
        .map_err(|e| map_error(Operation::Update, &webhook_resource(id), e))
    }

    /// Delete a webhook.
    pub async fn delete_webhook(&self, id: &str) -> ProviderResult<()> {
        self.rate_limited("delete webhook", || self.api.delete_webhook(id))
            .await
            .map_err(|e| map_error(Operation::Delete, &webhook_resource(id), e))
    }

    /// Fetch a segment.
    pub async fn get_segment(&self, id: &SegmentId) -> ProviderResult<UserSegment> {
        self.rate_limited("get segment", || self.api.get_segment(id))
            .await
            .map_err(|e| map_error(Operation::Read, &segment_resource(id), e))
    }

    /// Create a segment in one environment.
    pub async fn create_segment(
        &self,
        project_key: &str,
        env_key: &str,
        body: &UserSegmentBody,
    ) -> ProviderResult<UserSegment> {
        let id = SegmentId::new(project_key, env_key, body.key.as_str());
        self.created("create segment", || {
            self.api.post_segment(project_key, env_key, body)
        })
        .await
        .map_err(|e| map_error(Operation::Create, &segment_resource(&id), e))
    }

    /// Patch a segment.
    pub async fn update_segment(
        &self,
        id: &SegmentId,
        patch: &[PatchOperation],
    ) -> ProviderResult<UserSegment> {
        let api = &*self.api;
        self.patched(
            "update segment",
            move || async move { api.get_segment(id).await.map(|_| ()) },
            || api.patch_segment(id, patch),
        )
        .await
        .map_err(|e| map_error(Operation::Update, &segment_resource(id), e))
    }

    /// Delete a segment.
    pub async fn delete_segment(&self, id: &SegmentId) -> ProviderResult<()> {
        self.rate_limited("delete segment", || self.api.delete_segment(id))
            .await
            .map_err(|e| map_error(Operation::Delete, &segment_resource(id), e))
    }

    /// Fetch a flag, optionally narrowed to one environment.
    pub async fn get_feature_flag(
        &self,
        id: &FlagId,
        env_key: Option<&str>,
    ) -> ProviderResult<FeatureFlag> {
        self.rate_limited("get flag", || self.api.get_feature_flag(id, env_key))
            .await
            .map_err(|e| map_error(Operation::Read, &flag_resource(id), e))
    }

    /// Patch a flag with an audit comment.
    pub async fn update_feature_flag(
        &self,
        id: &FlagId,
        patch: &PatchComment,
    ) -> ProviderResult<FeatureFlag> {
        let api = &*self.api;
        self.patched(
            "update flag",
            move || async move { api.get_feature_flag(id, None).await.map(|_| ()) },
            || api.patch_feature_flag(id, patch),
        )
        .await
        .map_err(|e| map_error(Operation::Update, &flag_resource(id), e))
    }

    /// Fetch a project.
    pub async fn get_project(&self, key: &str) -> ProviderResult<Project> {
        self.rate_limited("get project", || self.api.get_project(key))
            .await
            .map_err(|e| map_error(Operation::Read, &format!("project with key {:?}", key), e))
    }
}

fn webhook_resource(id: &str) -> String {
    format!("webhook with id {:?}", id)
}

fn segment_resource(id: &SegmentId) -> String {
    format!(
        "segment {:?} of project {:?} in environment {:?}",
        id.segment_key, id.project_key, id.env_key
    )
}

fn flag_resource(id: &FlagId) -> String {
    format!("flag {:?} of project {:?}", id.flag_key, id.project_key)
}

/// Map a collaborator failure into the taxonomy. 409 and 429 only reach
/// here once their retry budget is spent.
fn map_error(op: Operation, resource: &str, err: ApiError) -> ProviderError {
    let message = format!("failed to {} {}: {}", op, resource, err);
    match err.status_code() {
        Some(404) => ProviderError::NotFound(message),
        Some(409) => ProviderError::Conflict(message),
        Some(429) => ProviderError::RateLimited(message),
        _ => ProviderError::Remote {
            op,
            resource: resource.to_string(),
            cause: err.to_string(),
        },
    }
}
