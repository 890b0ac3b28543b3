//! Test doubles for the provider.
//!
//! [`MockApi`] is an in-memory LaunchDarkly that applies JSON-Patch
//! `replace` operations to what it stores, with per-operation fault
//! injection and a call log. [`ProviderTester`] drives a
//! [`ProviderService`] the way the plugin host would.
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_launchdarkly::testing::{MockApi, ProviderTester};
//! use terraform_provider_launchdarkly::LaunchDarklyProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_webhook() {
//!     let mock = MockApi::new();
//!     let tester = ProviderTester::new(LaunchDarklyProvider::with_api(mock.clone()));
//!
//!     let state = tester
//!         .lifecycle_create("launchdarkly_webhook", json!({"url": "https://example.com", "enabled": true}))
//!         .await
//!         .unwrap();
//!     assert!(state["id"].is_string());
//! }
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::api::{
    ApiError, ApiResult, FeatureFlag, FeatureFlagConfig, LaunchDarklyApi, PatchComment,
    PatchOperation, Project, UserSegment, UserSegmentBody, Variation, VariationOrRollout, Webhook,
    WebhookBody,
};
use crate::error::ProviderError;
use crate::identity::{FlagId, SegmentId};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// One method of [`LaunchDarklyApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MockOp {
    GetWebhook,
    PostWebhook,
    PatchWebhook,
    DeleteWebhook,
    GetSegment,
    PostSegment,
    PatchSegment,
    DeleteSegment,
    GetFeatureFlag,
    PatchFeatureFlag,
    GetProject,
}

#[derive(Debug, Default)]
struct MockState {
    webhooks: BTreeMap<String, Webhook>,
    segments: BTreeMap<String, UserSegment>,
    flags: BTreeMap<String, FeatureFlag>,
    projects: BTreeMap<String, Project>,
    faults: HashMap<MockOp, VecDeque<u16>>,
    calls: Vec<MockOp>,
    patches: Vec<(MockOp, Vec<PatchOperation>)>,
    next_id: u64,
}

impl MockState {
    fn record(&mut self, op: MockOp) -> ApiResult<()> {
        self.calls.push(op);
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(status) => Err(ApiError::status(status, "injected failure")),
            None => Ok(()),
        }
    }
}

/// In-memory [`LaunchDarklyApi`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<RwLock<MockState>>,
}

impl MockApi {
    /// An empty account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `op` fail with `status`.
    pub async fn fail_next(&self, op: MockOp, status: u16, times: usize) {
        let mut state = self.state.write().await;
        let queue = state.faults.entry(op).or_default();
        queue.extend(std::iter::repeat(status).take(times));
    }

    /// How many times `op` was called, failed calls included.
    pub async fn call_count(&self, op: MockOp) -> usize {
        let state = self.state.read().await;
        state.calls.iter().filter(|call| **call == op).count()
    }

    /// Every call in order.
    pub async fn calls(&self) -> Vec<MockOp> {
        self.state.read().await.calls.clone()
    }

    /// Patch documents received for `op`, oldest first. Failed calls included.
    pub async fn patches(&self, op: MockOp) -> Vec<Vec<PatchOperation>> {
        let state = self.state.read().await;
        state
            .patches
            .iter()
            .filter(|(logged, _)| *logged == op)
            .map(|(_, patch)| patch.clone())
            .collect()
    }

    /// Store a webhook as if created out of band.
    pub async fn insert_webhook(&self, url: &str, on: bool) -> Webhook {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let hook = Webhook {
            id: format!("hook-{}", state.next_id),
            url: url.to_string(),
            on,
            name: None,
            tags: Vec::new(),
            statements: Vec::new(),
        };
        state.webhooks.insert(hook.id.clone(), hook.clone());
        hook
    }

    /// Store a segment as if created out of band.
    pub async fn insert_segment(&self, id: &SegmentId, name: &str) -> UserSegment {
        let segment = UserSegment {
            key: id.segment_key.clone(),
            name: name.to_string(),
            description: None,
            tags: Vec::new(),
            included: Vec::new(),
            excluded: Vec::new(),
            rules: Vec::new(),
        };
        let mut state = self.state.write().await;
        state.segments.insert(id.to_string(), segment.clone());
        segment
    }

    /// Store a flag under `project_key`.
    pub async fn insert_flag(&self, project_key: &str, flag: FeatureFlag) {
        let id = FlagId::new(project_key, flag.key.as_str());
        self.state.write().await.flags.insert(id.to_string(), flag);
    }

    /// Store a project.
    pub async fn insert_project(&self, key: &str, name: &str, tags: &[&str]) {
        let project = Project {
            key: key.to_string(),
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        self.state.write().await.projects.insert(key.to_string(), project);
    }

    /// Current copy of a stored webhook.
    pub async fn webhook(&self, id: &str) -> Option<Webhook> {
        self.state.read().await.webhooks.get(id).cloned()
    }

    /// Current copy of a stored segment.
    pub async fn segment(&self, id: &SegmentId) -> Option<UserSegment> {
        self.state.read().await.segments.get(&id.to_string()).cloned()
    }

    /// Current copy of a stored flag.
    pub async fn flag(&self, id: &FlagId) -> Option<FeatureFlag> {
        self.state.read().await.flags.get(&id.to_string()).cloned()
    }
}

/// A flag with the given variations and a freshly created config in each environment.
pub fn feature_flag(key: &str, variations: Vec<Value>, environments: &[&str]) -> FeatureFlag {
    let off_variation = variations.len().saturating_sub(1) as i64;
    FeatureFlag {
        key: key.to_string(),
        name: key.to_string(),
        description: String::new(),
        temporary: false,
        tags: Vec::new(),
        variations: variations
            .into_iter()
            .map(|value| Variation {
                value,
                name: None,
                description: None,
            })
            .collect(),
        client_side_availability: None,
        environments: environments
            .iter()
            .map(|env| {
                let config = FeatureFlagConfig {
                    off_variation: Some(off_variation),
                    fallthrough: Some(VariationOrRollout {
                        variation: Some(0),
                        rollout: None,
                    }),
                    ..Default::default()
                };
                (env.to_string(), config)
            })
            .collect(),
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::status(404, format!("unknown {}", what))
}

/// Apply `replace` operations by setting the last path segment on its parent object.
fn apply_patch<T: Serialize + DeserializeOwned>(target: &T, patch: &[PatchOperation]) -> ApiResult<T> {
    let mut doc = serde_json::to_value(target).map_err(|e| ApiError::Decode(e.to_string()))?;
    for operation in patch {
        if operation.op != "replace" {
            return Err(ApiError::status(400, format!("unsupported op {:?}", operation.op)));
        }
        let (parent, field) = operation
            .path
            .rsplit_once('/')
            .ok_or_else(|| ApiError::status(400, format!("invalid path {:?}", operation.path)))?;
        let object = doc
            .pointer_mut(parent)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| ApiError::status(400, format!("invalid path {:?}", operation.path)))?;
        object.insert(field.to_string(), operation.value.clone());
    }
    serde_json::from_value(doc).map_err(|e| ApiError::status(400, e.to_string()))
}

#[async_trait::async_trait]
impl LaunchDarklyApi for MockApi {
    async fn get_webhook(&self, id: &str) -> ApiResult<Webhook> {
        let mut state = self.state.write().await;
        state.record(MockOp::GetWebhook)?;
        state.webhooks.get(id).cloned().ok_or_else(|| not_found("webhook"))
    }

    async fn post_webhook(&self, body: &WebhookBody) -> ApiResult<Webhook> {
        let mut state = self.state.write().await;
        state.record(MockOp::PostWebhook)?;
        state.next_id += 1;
        let hook = Webhook {
            id: format!("hook-{}", state.next_id),
            url: body.url.clone(),
            on: body.on,
            name: body.name.clone(),
            tags: Vec::new(),
            statements: body.statements.clone(),
        };
        state.webhooks.insert(hook.id.clone(), hook.clone());
        Ok(hook)
    }

    async fn patch_webhook(&self, id: &str, patch: &[PatchOperation]) -> ApiResult<Webhook> {
        let mut state = self.state.write().await;
        state.patches.push((MockOp::PatchWebhook, patch.to_vec()));
        state.record(MockOp::PatchWebhook)?;
        let current = state.webhooks.get(id).ok_or_else(|| not_found("webhook"))?;
        let patched = apply_patch(current, patch)?;
        state.webhooks.insert(id.to_string(), patched.clone());
        Ok(patched)
    }

    async fn delete_webhook(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.record(MockOp::DeleteWebhook)?;
        state
            .webhooks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found("webhook"))
    }

    async fn get_segment(&self, id: &SegmentId) -> ApiResult<UserSegment> {
        let mut state = self.state.write().await;
        state.record(MockOp::GetSegment)?;
        state
            .segments
            .get(&id.to_string())
            .cloned()
            .ok_or_else(|| not_found("segment"))
    }

    async fn post_segment(
        &self,
        project_key: &str,
        env_key: &str,
        body: &UserSegmentBody,
    ) -> ApiResult<UserSegment> {
        let mut state = self.state.write().await;
        state.record(MockOp::PostSegment)?;
        let id = SegmentId::new(project_key, env_key, body.key.as_str()).to_string();
        if state.segments.contains_key(&id) {
            return Err(ApiError::status(409, "segment key already exists"));
        }
        let segment = UserSegment {
            key: body.key.clone(),
            name: body.name.clone(),
            description: body.description.clone(),
            tags: body.tags.clone(),
            included: Vec::new(),
            excluded: Vec::new(),
            rules: Vec::new(),
        };
        state.segments.insert(id, segment.clone());
        Ok(segment)
    }

    async fn patch_segment(&self, id: &SegmentId, patch: &[PatchOperation]) -> ApiResult<UserSegment> {
        let mut state = self.state.write().await;
        state.patches.push((MockOp::PatchSegment, patch.to_vec()));
        state.record(MockOp::PatchSegment)?;
        let key = id.to_string();
        let current = state.segments.get(&key).ok_or_else(|| not_found("segment"))?;
        let patched = apply_patch(current, patch)?;
        state.segments.insert(key, patched.clone());
        Ok(patched)
    }

    async fn delete_segment(&self, id: &SegmentId) -> ApiResult<()> {
        let mut state = self.state.write().await;
        state.record(MockOp::DeleteSegment)?;
        state
            .segments
            .remove(&id.to_string())
            .map(|_| ())
            .ok_or_else(|| not_found("segment"))
    }

    async fn get_feature_flag(&self, id: &FlagId, env_key: Option<&str>) -> ApiResult<FeatureFlag> {
        let mut state = self.state.write().await;
        state.record(MockOp::GetFeatureFlag)?;
        let mut flag = state
            .flags
            .get(&id.to_string())
            .cloned()
            .ok_or_else(|| not_found("flag"))?;
        if let Some(env) = env_key {
            flag.environments.retain(|key, _| key == env);
        }
        Ok(flag)
    }

    async fn patch_feature_flag(&self, id: &FlagId, patch: &PatchComment) -> ApiResult<FeatureFlag> {
        let mut state = self.state.write().await;
        state
            .patches
            .push((MockOp::PatchFeatureFlag, patch.patch.clone()));
        state.record(MockOp::PatchFeatureFlag)?;
        let key = id.to_string();
        let current = state.flags.get(&key).ok_or_else(|| not_found("flag"))?;
        let patched = apply_patch(current, &patch.patch)?;
        state.flags.insert(key, patched.clone());
        Ok(patched)
    }

    async fn get_project(&self, key: &str) -> ApiResult<Project> {
        let mut state = self.state.write().await;
        state.record(MockOp::GetProject)?;
        state.projects.get(key).cloned().ok_or_else(|| not_found("project"))
    }
}

/// Drives a [`ProviderService`] without a plugin host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Served resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Served data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider, failing on any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration, failing on any error diagnostic.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a data source configuration, failing on any error diagnostic.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a creation.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan an update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Create a resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan, update, then read back.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }
}

/// Failure of a harness call that reports diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics were returned.
    Diagnostics(Vec<Diagnostic>),
    /// The provider returned an error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| d.is_error())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Panics unless the plan changes `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to '{}', changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Panics if the plan changes anything.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_err;

    #[tokio::test]
    async fn test_patch_replaces_nested_fields() {
        let mock = MockApi::new();
        mock.insert_flag("default", feature_flag("basic", vec![json!(true), json!(false)], &["test"]))
            .await;
        let id = FlagId::new("default", "basic");

        let patch = PatchComment {
            comment: None,
            patch: vec![
                PatchOperation::replace("/environments/test/on", &true).unwrap(),
                PatchOperation::replace("/environments/test/offVariation", &0).unwrap(),
            ],
        };
        let patched = mock.patch_feature_flag(&id, &patch).await.unwrap();
        assert!(patched.environments["test"].on);
        assert_eq!(patched.environments["test"].off_variation, Some(0));
        assert_eq!(mock.patches(MockOp::PatchFeatureFlag).await.len(), 1);
    }

    #[tokio::test]
    async fn test_patch_unknown_parent_is_rejected() {
        let mock = MockApi::new();
        mock.insert_flag("default", feature_flag("basic", vec![json!(1)], &["test"]))
            .await;
        let patch = PatchComment {
            comment: None,
            patch: vec![PatchOperation::replace("/environments/prod/on", &true).unwrap()],
        };
        let err = assert_err!(mock.patch_feature_flag(&FlagId::new("default", "basic"), &patch).await);
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test]
    async fn test_faults_are_consumed_in_order() {
        let mock = MockApi::new();
        mock.insert_project("default", "Default", &[]).await;
        mock.fail_next(MockOp::GetProject, 500, 1).await;

        assert_eq!(mock.get_project("default").await.unwrap_err().status_code(), Some(500));
        assert!(mock.get_project("default").await.is_ok());
        assert_eq!(mock.call_count(MockOp::GetProject).await, 2);
    }

    #[tokio::test]
    async fn test_env_query_narrows_environments() {
        let mock = MockApi::new();
        mock.insert_flag("default", feature_flag("basic", vec![json!("a")], &["test", "production"]))
            .await;
        let flag = mock
            .get_feature_flag(&FlagId::new("default", "basic"), Some("test"))
            .await
            .unwrap();
        assert_eq!(flag.environments.keys().collect::<Vec<_>>(), vec!["test"]);
    }
}
