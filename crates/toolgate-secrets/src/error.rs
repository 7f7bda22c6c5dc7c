//! Error types for secret storage.

use thiserror::Error;

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Errors that can occur during secret operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The name is absent from one specific provider.
    #[error("secret {name:?} not found in provider {provider:?}")]
    NotFound { name: String, provider: String },

    /// A provider's availability probe said "skip me".
    #[error("provider {0:?} is not available")]
    Unavailable(String),

    /// Any other failure talking to a backend.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Every available provider was asked and none had the name.
    #[error("secret {name:?} not found in any provider (tried: {})", tried.join(", "))]
    NotFoundAnywhere { name: String, tried: Vec<String> },

    /// No provider in the chain passed its availability probe.
    #[error("no secret provider is available")]
    NoProviderAvailable,

    /// Every available provider failed with a real error.
    #[error("all providers failed: {}", failures.join("; "))]
    AllProvidersFailed { failures: Vec<String> },

    #[error("invalid provider selector {0:?}")]
    InvalidSelector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Whether this error means "the name simply is not there".
    ///
    /// The chain treats these as recoverable (try the next provider);
    /// everything else is a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SecretError::NotFound { .. } | SecretError::NotFoundAnywhere { .. }
        )
    }
}
