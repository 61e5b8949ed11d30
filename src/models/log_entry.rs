//! Operator diagnostics log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only diagnostic record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Unique record identifier.
    pub id: String,
    /// Component that produced the entry.
    pub module: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context, typically the error text.
    pub context: Option<serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Construct a new entry stamped now.
    #[must_use]
    pub fn new(module: &str, message: &str, context: Option<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            module: module.to_owned(),
            message: message.to_owned(),
            context,
            created_at: Utc::now(),
        }
    }
}
