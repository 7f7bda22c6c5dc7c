//! Encrypted local file backend, the chain's last-resort fallback.
//!
//! The whole store is one JSON document, loaded and rewritten wholesale on
//! every mutation:
//!
//! ```json
//! { "secrets": { "<name>": { "data": "<base64>", "nonce": "<base64>" } } }
//! ```
//!
//! Each value is encrypted independently with AES-256-GCM and a fresh
//! nonce. Mutations serialize through an async mutex; the load-modify-store
//! cycle would otherwise lose concurrent updates.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::crypto::{self, KeyOrigin, KEY_SIZE};
use crate::error::{Result, SecretError};
use crate::provider::SecretProvider;
use crate::types::StoredSecret;

/// Provider name used in listings and errors.
const PROVIDER_NAME: &str = "file";

/// One encrypted entry in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncryptedSecret {
    /// Base64-encoded ciphertext (including the GCM tag).
    data: String,
    /// Base64-encoded nonce.
    nonce: String,
}

/// The entire on-disk document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileSecretData {
    #[serde(default)]
    secrets: BTreeMap<String, EncryptedSecret>,
}

/// Encrypted-at-rest file backend. Always available.
pub struct FileProvider {
    secrets_file: PathBuf,
    key: [u8; KEY_SIZE],
    key_origin: KeyOrigin,
    /// Serializes all load-modify-store mutations.
    write_lock: Mutex<()>,
}

impl FileProvider {
    /// Create a provider over the default per-user secrets directory,
    /// using the process-wide installation key.
    pub fn new() -> Self {
        let secrets_file = toolgate_core::paths::secrets_file()
            .unwrap_or_else(|_| std::env::temp_dir().join("toolgate-secrets").join("secrets.json"));
        let (key, key_origin) = *crypto::default_key();
        Self {
            secrets_file,
            key,
            key_origin,
            write_lock: Mutex::new(()),
        }
    }

    /// Create a provider rooted at an explicit directory, resolving its
    /// own key there. Used by tests and non-default installations.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (key, key_origin) = crypto::load_or_create_key(&dir);
        Self {
            secrets_file: dir.join("secrets.json"),
            key,
            key_origin,
            write_lock: Mutex::new(()),
        }
    }

    /// Whether the provider is running on the derived fallback key.
    pub fn is_degraded(&self) -> bool {
        self.key_origin.is_degraded()
    }

    /// Load the document, treating a missing file as an empty store.
    async fn load_document(&self) -> Result<FileSecretData> {
        match tokio::fs::read(&self.secrets_file).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileSecretData::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the whole document with owner-only permissions.
    async fn save_document(&self, data: &FileSecretData) -> Result<()> {
        if let Some(dir) = self.secrets_file.parent() {
            tokio::fs::create_dir_all(dir).await?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                tokio::fs::set_permissions(dir, perms).await?;
            }
        }

        let json = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.secrets_file, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.secrets_file, perms).await?;
        }

        Ok(())
    }

    fn not_found(&self, name: &str) -> SecretError {
        SecretError::NotFound {
            name: name.to_string(),
            provider: PROVIDER_NAME.to_string(),
        }
    }
}

impl Default for FileProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SecretProvider for FileProvider {
    async fn get(&self, name: &str) -> Result<String> {
        let data = self.load_document().await?;
        let entry = data.secrets.get(name).ok_or_else(|| self.not_found(name))?;

        let ciphertext = BASE64
            .decode(&entry.data)
            .map_err(|e| SecretError::Decryption(format!("base64 decode failed: {e}")))?;
        let nonce = BASE64
            .decode(&entry.nonce)
            .map_err(|e| SecretError::Decryption(format!("base64 decode failed: {e}")))?;

        // An authentication failure means the key changed out from under
        // the document; the entry is as unrecoverable as an absent one.
        let plaintext = match crypto::decrypt(&self.key, &ciphertext, &nonce) {
            Ok(plaintext) => plaintext,
            Err(_) => return Err(self.not_found(name)),
        };

        String::from_utf8(plaintext)
            .map_err(|e| SecretError::Decryption(format!("invalid UTF-8: {e}")))
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut data = self.load_document().await.unwrap_or_default();
        let (ciphertext, nonce) = crypto::encrypt(&self.key, value.as_bytes())?;
        data.secrets.insert(
            name.to_string(),
            EncryptedSecret {
                data: BASE64.encode(&ciphertext),
                nonce: BASE64.encode(nonce),
            },
        );

        debug!(name, path = %self.secrets_file.display(), "writing secret");
        self.save_document(&data).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut data = self.load_document().await?;
        if data.secrets.remove(name).is_none() {
            return Err(self.not_found(name));
        }

        debug!(name, path = %self.secrets_file.display(), "deleting secret");
        self.save_document(&data).await
    }

    async fn list(&self) -> Result<Vec<StoredSecret>> {
        let data = self.load_document().await?;
        Ok(data
            .secrets
            .into_keys()
            .map(|name| StoredSecret {
                name,
                provider: PROVIDER_NAME.to_string(),
            })
            .collect())
    }

    async fn is_available(&self) -> bool {
        // Local file storage is the guaranteed fallback.
        true
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
