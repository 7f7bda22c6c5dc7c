//! AES-256-GCM encryption and key material lifecycle for the file backend.
//!
//! One raw 32-byte key per installation, persisted next to the secrets
//! document. Every value is encrypted independently with a fresh random
//! nonce; nonce reuse under the same key breaks GCM, so nonces are never
//! derived or counted, only drawn from the OS CSPRNG.

use std::path::Path;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use once_cell::sync::OnceCell;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, SecretError};

/// Key length in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// GCM nonce length in bytes.
pub const NONCE_SIZE: usize = 12;

/// Passphrase for the degraded deterministic key, used only when the key
/// directory cannot be created or read at all.
const FALLBACK_PASSPHRASE: &[u8] = b"toolgate-file-provider-fallback-key";

/// File name of the persisted key, sibling to the secrets document.
const KEY_FILE_NAME: &str = ".key";

/// How the encryption key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Loaded from an existing key file.
    Stored,
    /// Freshly generated and persisted.
    Generated,
    /// Derived from the fixed passphrase because the key directory was
    /// unusable. Functional, but every installation shares this key.
    DerivedFallback,
}

impl KeyOrigin {
    /// Whether the key provides less protection than a stored random key.
    pub fn is_degraded(&self) -> bool {
        matches!(self, KeyOrigin::DerivedFallback)
    }
}

/// Encrypt `plaintext`, returning the ciphertext (with auth tag) and the
/// freshly generated nonce.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_SIZE])> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| SecretError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| SecretError::Encryption(e.to_string()))?;

    Ok((ciphertext, nonce_bytes))
}

/// Decrypt data previously produced by [`encrypt`].
pub fn decrypt(key: &[u8; KEY_SIZE], ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(SecretError::Decryption(format!(
            "nonce has wrong length: {} (expected {NONCE_SIZE})",
            nonce.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| SecretError::Decryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| SecretError::Decryption(e.to_string()))
}

/// Load the installation key from `dir`, creating it on first use.
///
/// Resolution order:
/// 1. existing key file of exactly [`KEY_SIZE`] bytes
/// 2. generate via the OS CSPRNG and persist (dir 0700, file 0600)
/// 3. deterministic SHA-256 of a fixed passphrase when the directory is
///    unusable -- degraded but functional, and logged as such
pub fn load_or_create_key(dir: &Path) -> ([u8; KEY_SIZE], KeyOrigin) {
    let key_path = dir.join(KEY_FILE_NAME);

    if let Ok(data) = std::fs::read(&key_path) {
        if let Ok(key) = <[u8; KEY_SIZE]>::try_from(data.as_slice()) {
            debug!(path = %key_path.display(), "loaded existing encryption key");
            return (key, KeyOrigin::Stored);
        }
        warn!(path = %key_path.display(), "key file has wrong length, regenerating");
    }

    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);

    match persist_key(dir, &key_path, &key) {
        Ok(()) => {
            debug!(path = %key_path.display(), "generated new encryption key");
            (key, KeyOrigin::Generated)
        }
        Err(e) => {
            warn!(
                path = %key_path.display(),
                "cannot persist encryption key ({e}); falling back to a \
                 deterministic key -- secrets are obfuscated, not protected"
            );
            let digest = Sha256::digest(FALLBACK_PASSPHRASE);
            let mut fallback = [0u8; KEY_SIZE];
            fallback.copy_from_slice(&digest);
            (fallback, KeyOrigin::DerivedFallback)
        }
    }
}

/// Write the key file with owner-only permissions.
fn persist_key(dir: &Path, key_path: &Path, key: &[u8; KEY_SIZE]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }

    std::fs::write(key_path, key)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Process-wide key for the default secrets directory.
///
/// First successful initializer wins; every later call reuses the same
/// key material instead of re-reading the file.
pub fn default_key() -> &'static ([u8; KEY_SIZE], KeyOrigin) {
    static KEY: OnceCell<([u8; KEY_SIZE], KeyOrigin)> = OnceCell::new();
    KEY.get_or_init(|| {
        let dir = toolgate_core::paths::secrets_dir()
            .unwrap_or_else(|_| std::env::temp_dir().join("toolgate-secrets"));
        load_or_create_key(&dir)
    })
}
