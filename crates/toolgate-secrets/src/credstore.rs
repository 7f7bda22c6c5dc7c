//! OS credential helper backend.
//!
//! Delegates to an external helper executable found on `PATH`, one
//! short-lived subprocess per operation. The wire protocol is the
//! credential-helper convention: the verb is the single argument, the
//! payload travels as JSON (or a bare key) on stdin, the response comes
//! back on stdout.
//!
//! The subprocess is hidden behind [`HelperProgram`] so the protocol
//! logic is testable without spawning anything.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Result, SecretError};
use crate::provider::SecretProvider;
use crate::types::StoredSecret;

/// Provider name used in listings and errors.
const PROVIDER_NAME: &str = "credstore";

/// Prefix applied to every key handed to the helper, so gateway secrets
/// never collide with unrelated credentials the helper stores.
const SECRET_KEY_PREFIX: &str = "tg_";

/// Username recorded alongside stored secrets.
const CREDENTIAL_USERNAME: &str = "toolgate";

/// Upper bound on a single helper invocation.
const HELPER_TIMEOUT: Duration = Duration::from_secs(30);

/// Platform-specific helper executable name.
#[cfg(target_os = "macos")]
const HELPER_BINARY: &str = "toolgate-credential-keychain";
#[cfg(target_os = "windows")]
const HELPER_BINARY: &str = "toolgate-credential-wincred";
#[cfg(all(unix, not(target_os = "macos")))]
const HELPER_BINARY: &str = "toolgate-credential-pass";

/// Message the helper emits when a key is absent.
const NOT_FOUND_MESSAGE: &str = "credentials not found";

/// Helper wire protocol verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperVerb {
    Get,
    Store,
    Erase,
    List,
}

impl HelperVerb {
    fn as_str(self) -> &'static str {
        match self {
            HelperVerb::Get => "get",
            HelperVerb::Store => "store",
            HelperVerb::Erase => "erase",
            HelperVerb::List => "list",
        }
    }
}

/// A credentials record as exchanged with the helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "ServerURL")]
    pub server_url: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Secret")]
    pub secret: String,
}

/// Narrow abstraction over the helper executable: feed input, get output.
#[async_trait]
pub trait HelperProgram: Send + Sync {
    /// Invoke the helper with `verb`, writing `input` to its stdin and
    /// returning its stdout. A non-zero exit surfaces as [`SecretError::Backend`]
    /// carrying the helper's output.
    async fn run(&self, verb: HelperVerb, input: &[u8]) -> Result<Vec<u8>>;
}

/// Runs the real helper executable as a subprocess.
pub struct ShellProgram {
    path: PathBuf,
}

impl ShellProgram {
    /// Wrap the helper at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HelperProgram for ShellProgram {
    async fn run(&self, verb: HelperVerb, input: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.path)
            .arg(verb.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SecretError::Backend(format!("spawning credential helper: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|e| SecretError::Backend(format!("writing to credential helper: {e}")))?;
            // Closing stdin signals end of input.
        }

        let output = timeout(HELPER_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| SecretError::Backend("credential helper timed out".to_string()))?
            .map_err(|e| SecretError::Backend(format!("waiting for credential helper: {e}")))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let mut message = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if message.is_empty() {
                message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            }
            Err(SecretError::Backend(message))
        }
    }
}

/// Whether a helper error means the key is simply absent.
fn is_helper_not_found(err: &SecretError) -> bool {
    matches!(err, SecretError::Backend(msg) if msg.contains(NOT_FOUND_MESSAGE))
}

/// Whether a helper error is the known backing-store decryption failure.
///
/// Seen with gpg-backed stores when the signing key is unavailable; the
/// stored entry cannot be read back, but it can be overwritten.
fn is_decryption_error(err: &SecretError) -> bool {
    matches!(err, SecretError::Backend(msg) if msg.contains("gpg: decryption failed: No secret key"))
}

/// Locate an executable on the `PATH`.
fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

/// Secret backend delegating to the OS credential helper.
pub struct CredStoreProvider {
    program: Arc<dyn HelperProgram>,
}

impl CredStoreProvider {
    /// Create a provider over the platform's helper executable.
    pub fn new() -> Self {
        Self {
            program: Arc::new(ShellProgram::new(HELPER_BINARY)),
        }
    }

    /// Create a provider over an injected program (used in tests).
    pub fn with_program(program: Arc<dyn HelperProgram>) -> Self {
        Self { program }
    }

    fn secret_key(name: &str) -> String {
        format!("{SECRET_KEY_PREFIX}{name}")
    }

    fn not_found(&self, name: &str) -> SecretError {
        SecretError::NotFound {
            name: name.to_string(),
            provider: PROVIDER_NAME.to_string(),
        }
    }

    async fn helper_get(&self, key: &str) -> Result<Credentials> {
        let out = self.program.run(HelperVerb::Get, key.as_bytes()).await?;
        Ok(serde_json::from_slice(&out)?)
    }

    async fn helper_store(&self, creds: &Credentials) -> Result<()> {
        let body = serde_json::to_vec(creds)?;
        self.program.run(HelperVerb::Store, &body).await?;
        Ok(())
    }

    async fn helper_erase(&self, key: &str) -> Result<()> {
        self.program.run(HelperVerb::Erase, key.as_bytes()).await?;
        Ok(())
    }

    async fn helper_list(&self) -> Result<HashMap<String, String>> {
        let out = self.program.run(HelperVerb::List, &[]).await?;
        Ok(serde_json::from_slice(&out)?)
    }
}

impl Default for CredStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretProvider for CredStoreProvider {
    async fn get(&self, name: &str) -> Result<String> {
        match self.helper_get(&Self::secret_key(name)).await {
            Ok(creds) => Ok(creds.secret),
            Err(e) if is_helper_not_found(&e) => Err(self.not_found(name)),
            Err(e) => Err(e),
        }
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let key = Self::secret_key(name);

        // Idempotent store: skip the write when the helper already holds
        // the identical value. Absent entries and entries the backing
        // store can no longer decrypt are both overwritable.
        match self.helper_get(&key).await {
            Ok(existing)
                if existing.username == CREDENTIAL_USERNAME && existing.secret == value =>
            {
                debug!(name, "credential helper already holds this value");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if is_helper_not_found(&e) || is_decryption_error(&e) => {}
            Err(e) => return Err(e),
        }

        self.helper_store(&Credentials {
            server_url: key,
            username: CREDENTIAL_USERNAME.to_string(),
            secret: value.to_string(),
        })
        .await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let key = Self::secret_key(name);

        // Idempotent delete: an absent key is already in the desired state.
        match self.helper_get(&key).await {
            Ok(_) => self.helper_erase(&key).await,
            Err(e) if is_helper_not_found(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<StoredSecret>> {
        let all = self.helper_list().await?;

        let mut secrets: Vec<StoredSecret> = all
            .into_keys()
            .filter_map(|key| {
                key.strip_prefix(SECRET_KEY_PREFIX).map(|name| StoredSecret {
                    name: name.to_string(),
                    provider: PROVIDER_NAME.to_string(),
                })
            })
            .collect();
        secrets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(secrets)
    }

    async fn is_available(&self) -> bool {
        // Resolvability on PATH only; the helper is never invoked here.
        find_in_path(HELPER_BINARY).is_some()
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
