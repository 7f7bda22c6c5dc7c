//! Fallback composition of secret providers.
//!
//! Reads take the first hit in precedence order, writes target only the
//! first available provider, deletes are attempted everywhere, listings
//! merge with first-occurrence-wins. The chain is what the rest of the
//! gateway depends on; individual backends are an implementation detail.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::credstore::CredStoreProvider;
use crate::desktop::DesktopProvider;
use crate::error::{Result, SecretError};
use crate::file::FileProvider;
use crate::provider::SecretProvider;
use crate::types::StoredSecret;

/// An ordered list of providers exposing the same capability contract.
pub struct ChainProvider {
    providers: Vec<Arc<dyn SecretProvider>>,
}

impl ChainProvider {
    /// Compose the given providers; order is precedence.
    pub fn new(providers: Vec<Arc<dyn SecretProvider>>) -> Self {
        Self { providers }
    }

    /// The default chain, highest precedence first: desktop service, OS
    /// credential helper, encrypted file. The file backend is always
    /// available, so the chain as a whole always is.
    pub fn default_chain() -> Self {
        Self::new(vec![
            Arc::new(DesktopProvider::new()),
            Arc::new(CredStoreProvider::new()),
            Arc::new(FileProvider::new()),
        ])
    }

    /// Resolve several secrets at once for a trusted call site (tool
    /// server launch). Fails if any name cannot be resolved; partial
    /// results are never returned.
    pub async fn resolve_all(&self, names: &[String]) -> Result<HashMap<String, String>> {
        let mut values = HashMap::with_capacity(names.len());
        for name in names {
            let value = self.get(name).await?;
            values.insert(name.clone(), value);
        }
        Ok(values)
    }
}

#[async_trait]
impl SecretProvider for ChainProvider {
    async fn get(&self, name: &str) -> Result<String> {
        let mut tried = Vec::new();
        let mut failures = Vec::new();

        for provider in &self.providers {
            if !provider.is_available().await {
                continue;
            }
            tried.push(provider.provider_name().to_string());

            match provider.get(name).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_not_found() {
                        failures.push(format!("{}: {e}", provider.provider_name()));
                    }
                    debug!(
                        name,
                        provider = provider.provider_name(),
                        "provider could not resolve secret: {e}"
                    );
                }
            }
        }

        if tried.is_empty() {
            Err(SecretError::NoProviderAvailable)
        } else if failures.is_empty() {
            Err(SecretError::NotFoundAnywhere {
                name: name.to_string(),
                tried,
            })
        } else {
            Err(SecretError::AllProvidersFailed { failures })
        }
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        // Writes never fan out and never fall back: the first available
        // provider is the authoritative target, and its failure is the
        // caller's failure.
        for provider in &self.providers {
            if !provider.is_available().await {
                continue;
            }
            debug!(
                name,
                provider = provider.provider_name(),
                "storing secret"
            );
            return provider.set(name, value).await;
        }

        Err(SecretError::NoProviderAvailable)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut any_available = false;
        let mut deleted = false;
        let mut failures = Vec::new();

        for provider in &self.providers {
            if !provider.is_available().await {
                continue;
            }
            any_available = true;

            match provider.delete(name).await {
                Ok(()) => deleted = true,
                Err(e) if e.is_not_found() => {}
                Err(e) => failures.push(format!("{}: {e}", provider.provider_name())),
            }
        }

        if deleted {
            return Ok(());
        }
        if !any_available {
            return Err(SecretError::NoProviderAvailable);
        }
        if failures.is_empty() {
            // Every provider reported not-found; the name is already in
            // the desired state.
            return Ok(());
        }
        Err(SecretError::AllProvidersFailed { failures })
    }

    async fn list(&self) -> Result<Vec<StoredSecret>> {
        let mut merged = Vec::new();
        let mut seen = HashSet::new();

        for provider in &self.providers {
            if !provider.is_available().await {
                continue;
            }

            let entries = match provider.list().await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(
                        provider = provider.provider_name(),
                        "skipping provider that failed to list: {e}"
                    );
                    continue;
                }
            };

            for entry in entries {
                if seen.insert(entry.name.clone()) {
                    merged.push(StoredSecret {
                        name: entry.name,
                        provider: provider.provider_name().to_string(),
                    });
                }
            }
        }

        Ok(merged)
    }

    async fn is_available(&self) -> bool {
        for provider in &self.providers {
            if provider.is_available().await {
                return true;
            }
        }
        false
    }

    fn provider_name(&self) -> &'static str {
        "chain"
    }
}
