use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{ApiError, ApiResult, LaunchDarklyApi};
use super::types::*;
use crate::config::ClientSettings;
use crate::error::{ProviderError, ProviderResult};
use crate::identity::{FlagId, SegmentId};

const USER_AGENT: &str = concat!("terraform-provider-launchdarkly/", env!("CARGO_PKG_VERSION"));
const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
const RETRY_AFTER: &str = "Retry-After";

/// Error body shape returned by the API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// [`LaunchDarklyApi`] over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    /// Build a client authenticated with the configured token.
    pub fn new(settings: &ClientSettings) -> ProviderResult<Self> {
        Self::with_base_url(settings, settings.api_base_url())
    }

    /// Build a client against an explicit base URL.
    pub fn with_base_url(settings: &ClientSettings, base_url: impl AsRef<str>) -> ProviderResult<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ProviderError::Configuration(format!("invalid API base URL {:?}", base_url.as_ref()))
            })?;

        let mut token = HeaderValue::from_str(&settings.access_token).map_err(|_| {
            ProviderError::Configuration("access_token contains invalid characters".to_string())
        })?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// The base URL extended by `segments`, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn segment_url(&self, id: &SegmentId) -> Url {
        self.url(&[
            "segments",
            id.project_key.as_str(),
            id.env_key.as_str(),
            id.segment_key.as_str(),
        ])
    }

    fn flag_url(&self, id: &FlagId) -> Url {
        self.url(&["flags", id.project_key.as_str(), id.flag_key.as_str()])
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.exchange(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn send_empty(&self, request: RequestBuilder) -> ApiResult<()> {
        self.exchange(request).await.map(|_| ())
    }

    async fn exchange(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(status_error(response).await)
    }
}

async fn status_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let headers = response.headers();
    let rate_limit_reset = header_u64(headers, RATE_LIMIT_RESET);
    let retry_after = header_u64(headers, RETRY_AFTER).map(std::time::Duration::from_secs);

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => text,
    };

    ApiError::Status {
        status,
        message,
        rate_limit_reset,
        retry_after,
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[async_trait]
impl LaunchDarklyApi for HttpApi {
    async fn get_webhook(&self, id: &str) -> ApiResult<Webhook> {
        self.send(self.client.get(self.url(&["webhooks", id])))
            .await
    }

    async fn post_webhook(&self, body: &WebhookBody) -> ApiResult<Webhook> {
        self.send(self.client.post(self.url(&["webhooks"])).json(body))
            .await
    }

    async fn patch_webhook(&self, id: &str, patch: &[PatchOperation]) -> ApiResult<Webhook> {
        self.send(
            self.client
                .patch(self.url(&["webhooks", id]))
                .json(patch),
        )
        .await
    }

    async fn delete_webhook(&self, id: &str) -> ApiResult<()> {
        self.send_empty(self.client.delete(self.url(&["webhooks", id])))
            .await
    }

    async fn get_segment(&self, id: &SegmentId) -> ApiResult<UserSegment> {
        self.send(self.client.get(self.segment_url(id))).await
    }

    async fn post_segment(
        &self,
        project_key: &str,
        env_key: &str,
        body: &UserSegmentBody,
    ) -> ApiResult<UserSegment> {
        self.send(
            self.client
                .post(self.url(&["segments", project_key, env_key]))
                .json(body),
        )
        .await
    }

    async fn patch_segment(&self, id: &SegmentId, patch: &[PatchOperation]) -> ApiResult<UserSegment> {
        self.send(self.client.patch(self.segment_url(id)).json(patch))
            .await
    }

    async fn delete_segment(&self, id: &SegmentId) -> ApiResult<()> {
        self.send_empty(self.client.delete(self.segment_url(id)))
            .await
    }

    async fn get_feature_flag(&self, id: &FlagId, env_key: Option<&str>) -> ApiResult<FeatureFlag> {
        let mut request = self.client.get(self.flag_url(id));
        if let Some(env) = env_key {
            request = request.query(&[("env", env)]);
        }
        self.send(request).await
    }

    async fn patch_feature_flag(&self, id: &FlagId, patch: &PatchComment) -> ApiResult<FeatureFlag> {
        self.send(self.client.patch(self.flag_url(id)).json(patch))
            .await
    }

    async fn get_project(&self, key: &str) -> ApiResult<Project> {
        self.send(self.client.get(self.url(&["projects", key])))
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> HttpApi {
        let settings = ProviderConfig {
            access_token: Some("api-test-token".into()),
            ..Default::default()
        }
        .resolve_with(|_| None)
        .unwrap();
        HttpApi::with_base_url(&settings, server.uri()).unwrap()
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let settings = ProviderConfig {
            access_token: Some("api-test-token".into()),
            ..Default::default()
        }
        .resolve_with(|_| None)
        .unwrap();
        let api = HttpApi::with_base_url(&settings, "https://app.launchdarkly.com/api/v2/").unwrap();

        let id = SegmentId::new("default", "test", "a b/c?d");
        assert_eq!(
            api.segment_url(&id).as_str(),
            "https://app.launchdarkly.com/api/v2/segments/default/test/a%20b%2Fc%3Fd"
        );
        assert_eq!(
            api.url(&["projects", "default"]).as_str(),
            "https://app.launchdarkly.com/api/v2/projects/default"
        );

        let err = HttpApi::with_base_url(&settings, "not a url").unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_get_webhook_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webhooks/abc"))
            .and(header("authorization", "api-test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_id": "abc",
                "url": "https://example.com/hook",
                "on": true,
                "tags": ["ops"],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let webhook = api(&server).get_webhook("abc").await.unwrap();
        assert_eq!(webhook.id, "abc");
        assert_eq!(webhook.tags, vec!["ops"]);
    }

    #[tokio::test]
    async fn test_not_found_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webhooks/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"code": "not_found", "message": "Unknown webhook"})),
            )
            .mount(&server)
            .await;

        let err = api(&server).get_webhook("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "404 Not Found: Unknown webhook");
    }

    #[tokio::test]
    async fn test_rate_limit_headers_captured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/default"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("X-RateLimit-Reset", "1700000000000")
                    .insert_header("Retry-After", "3")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let err = api(&server).get_project("default").await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(err.rate_limit_reset(), Some(1_700_000_000_000));
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(3)));
        assert_eq!(err.to_string(), "429 Too Many Requests: slow down");
    }

    #[tokio::test]
    async fn test_patch_flag_body_and_env_query() {
        let server = MockServer::start().await;
        let flag = json!({"key": "basic", "name": "Basic", "variations": [{"value": true}, {"value": false}]});

        Mock::given(method("GET"))
            .and(path("/flags/default/basic"))
            .and(query_param("env", "test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(flag.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/flags/default/basic"))
            .and(body_json(json!({
                "comment": "Terraform",
                "patch": [{"op": "replace", "path": "/environments/test/on", "value": true}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(flag))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server);
        let id = FlagId::new("default", "basic");
        let fetched = api.get_feature_flag(&id, Some("test")).await.unwrap();
        assert_eq!(fetched.variations.len(), 2);

        let patch = PatchComment {
            comment: Some("Terraform".into()),
            patch: vec![PatchOperation::replace("/environments/test/on", &true).unwrap()],
        };
        api.patch_feature_flag(&id, &patch).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_segment_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/segments/default/test/beta"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let id = SegmentId::new("default", "test", "beta");
        api(&server).delete_segment(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/projects/default"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = api(&server).get_project("default").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }
}
