//! Secret storage backends for Toolgate.
//!
//! Secrets live in one of three backends: the desktop companion service,
//! the OS credential helper, or an AES-256-GCM encrypted file. The
//! [`ChainProvider`] composes them with fallback-on-read, first-target-on-
//! write semantics; everything downstream depends on the chain, never on a
//! single backend.

pub mod chain;
pub mod credstore;
pub mod crypto;
pub mod desktop;
pub mod error;
pub mod file;
pub mod provider;
pub mod types;

pub use chain::ChainProvider;
pub use credstore::CredStoreProvider;
pub use desktop::DesktopProvider;
pub use error::{Result, SecretError};
pub use file::FileProvider;
pub use provider::{from_selector, ProviderSelector, SecretProvider};
pub use types::{Secret, StoredSecret};
