//! Local IPC layer for `event-herald-ctl`.
//!
//! Provides a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! server that accepts JSON-line commands from the companion CLI.

pub mod server;

use std::path::Path;

use crate::Result;

/// Generate a fresh shared secret and write it to `path`.
///
/// The secret changes on every start, so only a caller able to read the
/// file of the running instance can issue commands.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be written.
pub fn issue_auth_token(path: &Path) -> Result<String> {
    let token = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &token)?;
    Ok(token)
}
