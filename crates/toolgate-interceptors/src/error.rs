//! Error types for the interception pipeline.

use thiserror::Error;

/// Convenience result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, InterceptError>;

/// Errors raised by pipeline stages.
#[derive(Debug, Error)]
pub enum InterceptError {
    /// The secret-blocking stage refused to forward a request.
    ///
    /// Expected, user-facing behavior -- not a crash condition.
    #[error("a secret is being passed to tool {tool}")]
    SecretInArguments { tool: String },

    /// The secret-blocking stage refused to return a response.
    #[error("a secret is being returned by the {tool} tool")]
    SecretInResponse { tool: String },

    /// A malformed interceptor spec or other invalid configuration.
    ///
    /// Fatal at startup: the pipeline must never be constructed from a
    /// configuration that failed to parse.
    #[error("invalid interceptor spec {spec:?}: {reason}")]
    Config { spec: String, reason: String },

    /// A user-supplied interceptor failed to execute.
    #[error("executing interceptor: {0}")]
    Interceptor(String),

    /// The underlying method handler failed.
    #[error("handler error: {0}")]
    Handler(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InterceptError {
    /// Whether this error came from the secret-blocking stage.
    pub fn is_leak(&self) -> bool {
        matches!(
            self,
            InterceptError::SecretInArguments { .. } | InterceptError::SecretInResponse { .. }
        )
    }
}
