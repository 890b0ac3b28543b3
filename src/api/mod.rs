//! The LaunchDarkly REST API as seen by the reconcilers.
//!
//! [`LaunchDarklyApi`] is the collaborator seam: [`HttpApi`] talks to the
//! real service, `testing::MockApi` keeps objects in memory. Every method
//! is a single HTTP exchange; retries live in [`crate::retry`].

mod http;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::{FlagId, SegmentId};

pub use http::HttpApi;
pub use types::*;

/// Result of a single API exchange.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a single API exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The remote answered with a non-2xx status.
    #[error("{}: {}", status_line(*.status), .message)]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message from the response body.
        message: String,
        /// `X-RateLimit-Reset`, epoch milliseconds.
        rate_limit_reset: Option<u64>,
        /// `Retry-After`, when sent in seconds.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),

    /// A 2xx response whose body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// A status error without rate-limit hints.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
            rate_limit_reset: None,
            retry_after: None,
        }
    }

    /// HTTP status, if the remote answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// 409.
    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }

    /// 429.
    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }

    /// Reset instant sent with a 429, epoch milliseconds.
    pub fn rate_limit_reset(&self) -> Option<u64> {
        match self {
            Self::Status {
                rate_limit_reset, ..
            } => *rate_limit_reset,
            _ => None,
        }
    }

    /// `Retry-After` sent with a 429.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn status_line(status: u16) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason());
    match reason {
        Some(reason) => format!("{} {}", status, reason),
        None => status.to_string(),
    }
}

/// The subset of the LaunchDarkly API the provider manages.
#[async_trait]
pub trait LaunchDarklyApi: Send + Sync {
    /// `GET /webhooks/{id}`
    async fn get_webhook(&self, id: &str) -> ApiResult<Webhook>;

    /// `POST /webhooks`
    async fn post_webhook(&self, body: &WebhookBody) -> ApiResult<Webhook>;

    /// `PATCH /webhooks/{id}`
    async fn patch_webhook(&self, id: &str, patch: &[PatchOperation]) -> ApiResult<Webhook>;

    /// `DELETE /webhooks/{id}`
    async fn delete_webhook(&self, id: &str) -> ApiResult<()>;

    /// `GET /segments/{project}/{env}/{key}`
    async fn get_segment(&self, id: &SegmentId) -> ApiResult<UserSegment>;

    /// `POST /segments/{project}/{env}`
    async fn post_segment(
        &self,
        project_key: &str,
        env_key: &str,
        body: &UserSegmentBody,
    ) -> ApiResult<UserSegment>;

    /// `PATCH /segments/{project}/{env}/{key}`
    async fn patch_segment(&self, id: &SegmentId, patch: &[PatchOperation]) -> ApiResult<UserSegment>;

    /// `DELETE /segments/{project}/{env}/{key}`
    async fn delete_segment(&self, id: &SegmentId) -> ApiResult<()>;

    /// `GET /flags/{project}/{key}`, optionally narrowed to one environment.
    async fn get_feature_flag(&self, id: &FlagId, env_key: Option<&str>) -> ApiResult<FeatureFlag>;

    /// `PATCH /flags/{project}/{key}`
    async fn patch_feature_flag(&self, id: &FlagId, patch: &PatchComment) -> ApiResult<FeatureFlag>;

    /// `GET /projects/{key}`
    async fn get_project(&self, key: &str) -> ApiResult<Project>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(
            ApiError::status(404, "unknown webhook").to_string(),
            "404 Not Found: unknown webhook"
        );
        assert_eq!(
            ApiError::status(429, "slow down").to_string(),
            "429 Too Many Requests: slow down"
        );
        assert_eq!(ApiError::status(599, "odd").to_string(), "599: odd");
    }

    #[test]
    fn test_classification() {
        assert!(ApiError::status(404, "").is_not_found());
        assert!(ApiError::status(409, "").is_conflict());
        assert!(ApiError::status(429, "").is_rate_limited());
        assert!(!ApiError::Transport("timed out".into()).is_rate_limited());
        assert_eq!(ApiError::Decode("eof".into()).status_code(), None);
    }
}
