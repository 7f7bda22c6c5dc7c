//! Path resolution utilities.

use crate::error::Error;
use std::path::PathBuf;

/// Get the Toolgate base directory (~/.toolgate).
pub fn base_dir() -> Result<PathBuf, Error> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Path("Could not determine home directory".to_string()))?;
    Ok(home.join(".toolgate"))
}

/// Get the secrets directory (~/.toolgate/secrets).
pub fn secrets_dir() -> Result<PathBuf, Error> {
    Ok(base_dir()?.join("secrets"))
}

/// Get the encrypted secrets document path (~/.toolgate/secrets/secrets.json).
pub fn secrets_file() -> Result<PathBuf, Error> {
    Ok(secrets_dir()?.join("secrets.json"))
}

/// Get the encryption key file path (~/.toolgate/secrets/.key).
pub fn key_file() -> Result<PathBuf, Error> {
    Ok(secrets_dir()?.join(".key"))
}

/// Get the desktop service socket path (~/.toolgate/desktop.sock).
pub fn desktop_socket() -> Result<PathBuf, Error> {
    Ok(base_dir()?.join("desktop.sock"))
}
