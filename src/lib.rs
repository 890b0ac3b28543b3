//! LaunchDarkly provider
//!
//! Reconciles declarative configuration against the LaunchDarkly REST API:
//! webhooks, user segments and a flag's targeting in one environment, plus
//! read-only lookups of webhooks, segments, projects and feature flags.
//!
//! # Overview
//!
//! - **ProviderService**: the boundary the plugin host drives with untyped attribute trees
//! - **LaunchDarklyProvider**: the implementation, dispatching by resource type name
//! - **Models**: typed declarative state per resource, with cross-field validation
//! - **Encode / decode / patch**: mapping between declarative state and the API's wire shapes
//! - **Client**: the API behind rate-limit (429) and conflict (409) retries
//! - **Logging**: `tracing` to stderr, filtered by `RUST_LOG`
//!
//! # Quick Start
//!
//! ```ignore
//! use terraform_provider_launchdarkly::{init_logging, LaunchDarklyProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let provider = LaunchDarklyProvider::new();
//!     provider.configure(json!({"access_token": "api-..."})).await?;
//!
//!     let state = provider
//!         .create(
//!             "launchdarkly_webhook",
//!             json!({"url": "https://example.com/hook", "enabled": true}),
//!         )
//!         .await?;
//!     println!("created webhook {}", state["id"]);
//!     Ok(())
//! }
//! ```
//!
//! # Resource types
//!
//! | Type | Identity |
//! |---|---|
//! | `launchdarkly_webhook` | server-assigned id |
//! | `launchdarkly_segment` | `project_key/env_key/key` |
//! | `launchdarkly_feature_flag_environment` | `project_key/env_key/flag_key` |
//!
//! Data sources: `launchdarkly_webhook`, `launchdarkly_segment`,
//! `launchdarkly_project`, `launchdarkly_feature_flag`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod decode;
pub mod encode;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;
pub mod patch;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::Client;
pub use config::{ClientSettings, ProviderConfig};
pub use error::{ProviderError, ProviderResult};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::LaunchDarklyProvider;
pub use retry::RetrySettings;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
pub use serde_json;
pub use tracing;
