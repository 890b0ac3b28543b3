//! Provider configuration block.
//!
//! Values set in configuration win; unset values fall back to the
//! `LAUNCHDARKLY_ACCESS_TOKEN` and `LAUNCHDARKLY_API_HOST` environment variables.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::retry::RetrySettings;
use crate::schema::{Attribute, AttributeValidator, Schema};

/// Environment variable holding the API access token.
pub const ACCESS_TOKEN_ENV: &str = "LAUNCHDARKLY_ACCESS_TOKEN";

/// Environment variable overriding the API host.
pub const API_HOST_ENV: &str = "LAUNCHDARKLY_API_HOST";

/// Host used when neither configuration nor environment name one.
pub const DEFAULT_API_HOST: &str = "https://app.launchdarkly.com";

/// Request timeout used when `http_timeout` is not set.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// The provider block as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// API access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// API host, scheme included.
    #[serde(default)]
    pub api_host: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub http_timeout: Option<i64>,
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "access_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!(
                        "LaunchDarkly access token. Falls back to {}.",
                        ACCESS_TOKEN_ENV
                    )),
            )
            .with_attribute(
                "api_host",
                Attribute::optional_string().with_description(format!(
                    "LaunchDarkly host, defaults to {}. Falls back to {}.",
                    DEFAULT_API_HOST, API_HOST_ENV
                )),
            )
            .with_attribute(
                "http_timeout",
                Attribute::optional_int64()
                    .with_validator(AttributeValidator::IntAtLeast(1))
                    .with_description("Timeout in seconds for each API request."),
            )
    }

    /// Parse the provider block from its attribute tree. `null` means an empty block.
    pub fn from_value(value: serde_json::Value) -> ProviderResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> ProviderResult<ClientSettings> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with<F>(self, env: F) -> ProviderResult<ClientSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = non_empty(self.access_token)
            .or_else(|| non_empty(env(ACCESS_TOKEN_ENV)))
            .ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "access_token must be set in the provider block or via {}",
                    ACCESS_TOKEN_ENV
                ))
            })?;

        let api_host = non_empty(self.api_host)
            .or_else(|| non_empty(env(API_HOST_ENV)))
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let http_timeout = match self.http_timeout {
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            Some(secs) if secs >= 1 => Duration::from_secs(secs as u64),
            Some(secs) => {
                return Err(ProviderError::Configuration(format!(
                    "http_timeout must be at least 1 second, got {}",
                    secs
                )))
            },
        };

        Ok(ClientSettings {
            access_token,
            api_host: api_host.trim_end_matches('/').to_string(),
            http_timeout,
            retry: RetrySettings::default(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Fully resolved settings for building a [`crate::client::Client`].
#[derive(Clone)]
pub struct ClientSettings {
    /// API access token.
    pub access_token: String,
    /// API host without a trailing slash.
    pub api_host: String,
    /// Per-request timeout.
    pub http_timeout: Duration,
    /// Rate-limit and conflict retry bounds.
    pub retry: RetrySettings,
}

impl ClientSettings {
    /// Base URL of the v2 REST API.
    pub fn api_base_url(&self) -> String {
        format!("{}/api/v2", self.api_host)
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("access_token", &"(sensitive)")
            .field("api_host", &self.api_host)
            .field("http_timeout", &self.http_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}
