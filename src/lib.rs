#![forbid(unsafe_code)]

//! Event relay from a Telegram channel to an X account.
//!
//! The [`orchestrator`] owns the long-lived relay actor; [`collector`],
//! [`analyzer`] and [`publisher`] define the collaborator seams together
//! with their HTTP implementations.

use std::future::Future;
use std::pin::Pin;

pub mod analyzer;
pub mod collector;
pub mod config;
pub mod errors;
pub mod http;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod publisher;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};

/// Boxed, sendable future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;
