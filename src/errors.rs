//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Source channel (Telegram) API failure.
    Collector(String),
    /// Content analysis (Gemini) API failure.
    Analyzer(String),
    /// Social publishing (X) API failure.
    Publisher(String),
    /// IPC communication failure.
    Ipc(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// A post status change that the lifecycle forbids.
    InvalidTransition(String),
    /// Caller is not authorized to perform the requested action.
    Unauthorized(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Collector(msg) => write!(f, "collector: {msg}"),
            Self::Analyzer(msg) => write!(f, "analyzer: {msg}"),
            Self::Publisher(msg) => write!(f, "publisher: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
