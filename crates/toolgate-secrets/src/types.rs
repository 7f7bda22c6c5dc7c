//! Value types shared by all providers.

use serde::{Deserialize, Serialize};

/// A secret with its plaintext value.
///
/// `provider` is advisory metadata about where the secret came from or
/// should be recorded as coming from; it is never part of the lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    /// Caller-chosen identifier, unique within a provider's keyspace.
    pub name: String,

    /// Advisory provider tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,

    /// Raw secret payload.
    pub value: String,
}

/// A listing entry: value intentionally omitted.
///
/// Listing must never force plaintext retrieval across backends that do
/// not return values in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    /// Secret name.
    pub name: String,

    /// Name of the provider the entry was found in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
}
