//! Secret round-trip integration tests.
//!
//! These tests exercise the file backend through the chain, the way the
//! gateway actually consumes it.

use std::sync::Arc;

use tempfile::TempDir;
use toolgate_secrets::{ChainProvider, FileProvider, SecretError, SecretProvider};

fn chain_over_file(dir: &TempDir) -> ChainProvider {
    ChainProvider::new(vec![Arc::new(FileProvider::with_dir(dir.path()))])
}

#[tokio::test]
async fn test_roundtrip_through_chain() {
    let dir = TempDir::new().unwrap();
    let chain = chain_over_file(&dir);

    chain.set("api_key", "hunter2").await.unwrap();
    assert_eq!(chain.get("api_key").await.unwrap(), "hunter2");
}

#[tokio::test]
async fn test_roundtrip_printable_ascii_values() {
    let dir = TempDir::new().unwrap();
    let chain = chain_over_file(&dir);

    let values = [
        "simple",
        "with spaces and\ttabs",
        "punctuation!@#$%^&*()_+-=[]{}|;':\",./<>?",
        "~`",
        "",
    ];
    for (i, value) in values.iter().enumerate() {
        let name = format!("secret{i}");
        chain.set(&name, value).await.unwrap();
        assert_eq!(&chain.get(&name).await.unwrap(), value);
    }
}

#[tokio::test]
async fn test_values_survive_provider_restart() {
    let dir = TempDir::new().unwrap();

    chain_over_file(&dir).set("persistent", "v1").await.unwrap();

    // A fresh provider over the same directory reloads key and document.
    let reopened = chain_over_file(&dir);
    assert_eq!(reopened.get("persistent").await.unwrap(), "v1");
}

#[tokio::test]
async fn test_chain_miss_is_a_clean_not_found() {
    let dir = TempDir::new().unwrap();
    let chain = chain_over_file(&dir);

    let err = chain.get("never-stored").await.unwrap_err();
    assert!(matches!(err, SecretError::NotFoundAnywhere { .. }));
    // The message is user-facing: no internal backend details leak out.
    assert!(err.to_string().contains("never-stored"));
}

#[tokio::test]
async fn test_delete_is_idempotent_end_to_end() {
    let dir = TempDir::new().unwrap();
    let chain = chain_over_file(&dir);

    chain.set("doomed", "v").await.unwrap();
    chain.delete("doomed").await.unwrap();
    chain.delete("doomed").await.unwrap();
    assert!(chain.get("doomed").await.is_err());
}

#[tokio::test]
async fn test_resolve_all_for_tool_server_launch() {
    let dir = TempDir::new().unwrap();
    let chain = chain_over_file(&dir);

    chain.set("db_password", "p1").await.unwrap();
    chain.set("api_token", "p2").await.unwrap();

    let values = chain
        .resolve_all(&["db_password".to_string(), "api_token".to_string()])
        .await
        .unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values["db_password"], "p1");
    assert_eq!(values["api_token"], "p2");
}
