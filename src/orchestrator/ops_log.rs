//! Operator-visible failure log.
//!
//! Every caught collaborator failure goes to `tracing` and to the
//! `log_entry` table, where it feeds the error count of the status report.

use std::fmt::Display;

use serde_json::json;
use tracing::{error, warn};

use crate::models::log_entry::LogEntry;
use crate::persistence::log_repo::LogRepo;

/// Writer for operator log entries.
#[derive(Clone)]
pub struct OpsLog {
    repo: LogRepo,
}

impl OpsLog {
    /// Create a log writer over `repo`.
    #[must_use]
    pub fn new(repo: LogRepo) -> Self {
        Self { repo }
    }

    /// Record a caught failure.
    ///
    /// A failure to persist the entry is only traced; logging never fails
    /// the surrounding step.
    pub async fn error(&self, module: &str, message: &str, err: &(dyn Display + Sync)) {
        error!(module, error = %err, "{message}");
        let entry = LogEntry::new(module, message, Some(json!({ "error": err.to_string() })));
        if let Err(store_err) = self.repo.append(&entry).await {
            warn!(module, %store_err, "failed to persist log entry");
        }
    }
}
