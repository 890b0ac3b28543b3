//! Error types for the LaunchDarkly provider.

use std::fmt;

use thiserror::Error;

use crate::schema::Diagnostic;

/// The remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// POST of a new object.
    Create,
    /// GET of an existing object.
    Read,
    /// PATCH of an existing object.
    Update,
    /// DELETE of an existing object.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Create => "create",
            Self::Read => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// Errors that can occur while reconciling LaunchDarkly resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Local input was rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A validated structure could not be mapped onto the wire shape.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The remote object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The remote kept answering 409 after all retries.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The remote kept answering 429 after all retries.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-2xx answer or transport failure.
    #[error("failed to {op} {resource}: {cause}")]
    Remote {
        /// The operation that failed.
        op: Operation,
        /// Resource kind and identity, e.g. `webhook with id "abc"`.
        resource: String,
        /// Message supplied by the collaborator.
        cause: String,
    },

    /// A composite identity could not be parsed.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Provider configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is not served by this provider.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// The object was created remotely but a later step of the create failed.
    ///
    /// `state` carries the identity so the host can keep tracking the object.
    #[error("{source}")]
    PartiallyCreated {
        /// State recorded so far, with the server-assigned id set.
        state: Box<serde_json::Value>,
        /// The failure that interrupted the create.
        source: Box<ProviderError>,
    },

    /// Attribute state did not match the declarative model.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(msg)
            | Self::Encode(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::RateLimited(msg)
            | Self::InvalidIdentity(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg) => msg.clone(),
            Self::Remote { .. } => self.to_string(),
            Self::PartiallyCreated { source, .. } => source.message(),
            Self::Serialization(err) => err.to_string(),
        }
    }

    /// Whether the failure class is one the retry wrappers handle.
    ///
    /// Errors of these classes reaching the orchestrator mean the retry
    /// budget was already spent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::RateLimited(_))
    }

    /// Wrap a failure that happened after the remote object came into being.
    pub fn partially_created(state: serde_json::Value, source: ProviderError) -> Self {
        Self::PartiallyCreated {
            state: Box::new(state),
            source: Box::new(source),
        }
    }

    /// State the host should record despite the error, if any.
    pub fn partial_state(&self) -> Option<&serde_json::Value> {
        match self {
            Self::PartiallyCreated { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Short summary used as the diagnostic headline.
    fn summary(&self) -> &'static str {
        match self {
            Self::PartiallyCreated { source, .. } => source.summary(),
            Self::Validation(_) => "Invalid configuration",
            Self::Encode(_) => "Cannot encode request",
            Self::NotFound(_) => "Not found",
            Self::Conflict(_) => "Conflicting concurrent update",
            Self::RateLimited(_) => "Rate limit exhausted",
            Self::Remote { .. } => "LaunchDarkly API error",
            Self::InvalidIdentity(_) => "Invalid import ID",
            Self::Configuration(_) => "Provider not configured",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Serialization(_) => "Invalid state",
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::error(err.summary()).with_detail(err.to_string())
    }
}

/// Result alias used throughout the provider.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("webhook-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: webhook-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("launchdarkly_team".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: launchdarkly_team"
        );
    }

    #[test]
    fn test_remote_error_display() {
        let err = ProviderError::Remote {
            op: Operation::Create,
            resource: "webhook with name \"hook\"".to_string(),
            cause: "400 Bad Request: invalid url".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to create webhook with name \"hook\": 400 Bad Request: invalid url"
        );
        assert_eq!(err.message(), err.to_string());
    }

    #[test]
    fn test_operation_verbs() {
        assert_eq!(Operation::Create.to_string(), "create");
        assert_eq!(Operation::Read.to_string(), "get");
        assert_eq!(Operation::Update.to_string(), "update");
        assert_eq!(Operation::Delete.to_string(), "delete");
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::InvalidIdentity("no separator".to_string());
        assert_eq!(err.message(), "no separator");

        let err = ProviderError::Configuration("missing token".to_string());
        assert_eq!(err.message(), "missing token");
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ProviderError::Conflict("x".into()).is_retryable());
        assert!(ProviderError::RateLimited("x".into()).is_retryable());
        assert!(!ProviderError::NotFound("x".into()).is_retryable());
        assert!(!ProviderError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn test_partially_created_keeps_state() {
        let err = ProviderError::partially_created(
            serde_json::json!({"id": "hook-1"}),
            ProviderError::Validation("bad patch".into()),
        );
        assert_eq!(err.partial_state().unwrap()["id"], "hook-1");
        assert_eq!(err.message(), "bad patch");
        assert_eq!(err.to_string(), "Validation error: bad patch");
        assert!(ProviderError::NotFound("x".into()).partial_state().is_none());

        let diag: Diagnostic = err.into();
        assert_eq!(diag.summary, "Invalid configuration");
    }

    #[test]
    fn test_error_to_diagnostic() {
        let diag: Diagnostic = ProviderError::Validation("bad effect".to_string()).into();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Invalid configuration");
        assert_eq!(
            diag.detail,
            Some("Validation error: bad effect".to_string())
        );
    }
}
