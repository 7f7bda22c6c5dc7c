//! The provider capability contract and the CLI-facing selector.

use std::sync::Arc;

use async_trait::async_trait;

use crate::chain::ChainProvider;
use crate::credstore::CredStoreProvider;
use crate::desktop::DesktopProvider;
use crate::error::{Result, SecretError};
use crate::types::StoredSecret;

/// Async trait for secret storage backends.
///
/// Every backend is polymorphic over this capability set; the chain
/// composes them without knowing which concrete backend is which.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Retrieve a secret's plaintext value by name.
    async fn get(&self, name: &str) -> Result<String>;

    /// Store a secret under the given name, overwriting any existing value.
    async fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Delete a secret by name.
    async fn delete(&self, name: &str) -> Result<()>;

    /// List stored secrets (metadata only, never plaintext).
    async fn list(&self) -> Result<Vec<StoredSecret>>;

    /// Availability probe. Must not fail; `false` means "skip me".
    async fn is_available(&self) -> bool;

    /// Stable identifier used to tag listings and disambiguate errors.
    fn provider_name(&self) -> &'static str;
}

/// Parsed form of the `--provider` selector the CLI hands us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelector {
    /// Empty selector: the default fallback chain.
    Default,
    /// The OS credential helper only.
    CredStore,
    /// The desktop backend, tagging stored secrets with `oauth/<name>`.
    OAuth(String),
}

impl ProviderSelector {
    /// Parse a selector string. Anything unrecognized is a configuration
    /// error, rejected before any provider is constructed.
    pub fn parse(selector: &str) -> Result<Self> {
        match selector {
            "" => Ok(Self::Default),
            "credstore" => Ok(Self::CredStore),
            other => match other.strip_prefix("oauth/") {
                Some(name) if !name.is_empty() => Ok(Self::OAuth(name.to_string())),
                _ => Err(SecretError::InvalidSelector(selector.to_string())),
            },
        }
    }
}

/// Construct the provider a selector names.
pub fn from_selector(selector: &str) -> Result<Arc<dyn SecretProvider>> {
    match ProviderSelector::parse(selector)? {
        ProviderSelector::Default => Ok(Arc::new(ChainProvider::default_chain())),
        ProviderSelector::CredStore => Ok(Arc::new(CredStoreProvider::new())),
        ProviderSelector::OAuth(name) => Ok(Arc::new(
            DesktopProvider::new().with_provider_tag(format!("oauth/{name}")),
        )),
    }
}
