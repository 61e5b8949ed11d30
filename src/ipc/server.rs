//! Local IPC server for `event-herald-ctl` commands.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Accepts line-delimited JSON commands
//! and forwards them to the relay actor.
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "tick", "auth_token": "..."}
//! {"command": "publish", "id": "1042", "auth_token": "..."}
//! {"command": "add-birthday", "name": "Ada", "date": "12-10", "auth_token": "..."}
//! {"command": "history", "limit": 50, "auth_token": "..."}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "not found: post 1042"}
//! ```

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::models::scheduler_state::DailyJob;
use crate::orchestrator::actor::RelayHandle;
use crate::{AppError, Result};

/// Default number of rows returned by listing commands.
const DEFAULT_LIST_LIMIT: u32 = 20;

/// Inbound IPC request from `event-herald-ctl`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IpcRequest {
    /// Command verb.
    pub command: String,
    /// Post identifier (for `publish`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Member name (for `add-birthday`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Birthday (for `add-birthday`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Account username (for `lookup-user`, `mentions`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Row limit (for `posts`, `logs`, `history`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Shared-secret authentication token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Outbound IPC response to `event-herald-ctl`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|value| {
            serde_json::to_value(value)
                .map_err(|err| AppError::Ipc(format!("failed to encode response: {err}")))
        }) {
            Ok(data) => Self::success(data),
            Err(err) => Self::error(err.to_string()),
        }
    }
}

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    name: &str,
    relay: RelayHandle,
    auth_token: Option<String>,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = name.to_owned();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let handle = tokio::spawn(async move {
        let span = info_span!("ipc_server", name = %name);
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                tokio::spawn(handle_connection(
                                    stream,
                                    relay.clone(),
                                    auth_token.clone(),
                                ));
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;
    });

    Ok(handle)
}

/// Handle a single IPC client connection.
async fn handle_connection(
    stream: interprocess::local_socket::tokio::Stream,
    relay: RelayHandle,
    auth_token: Option<String>,
) {
    let span = info_span!("ipc_conn");
    async move {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            match buf_reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = match serde_json::from_str::<IpcRequest>(trimmed) {
                        Ok(request) => {
                            dispatch_command(request, &relay, auth_token.as_deref()).await
                        }
                        Err(err) => IpcResponse::error(format!("invalid json: {err}")),
                    };

                    let mut response_line = serde_json::to_string(&response).unwrap_or_else(|_| {
                        r#"{"ok":false,"error":"serialization failed"}"#.to_owned()
                    });
                    response_line.push('\n');

                    if let Err(err) = writer.write_all(response_line.as_bytes()).await {
                        warn!(%err, "failed to write ipc response");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}

/// Route an IPC command to the relay actor.
async fn dispatch_command(
    request: IpcRequest,
    relay: &RelayHandle,
    expected_token: Option<&str>,
) -> IpcResponse {
    let span = info_span!("ipc_command", command = %request.command);
    async move {
        if let Some(expected) = expected_token {
            if request.auth_token.as_deref() != Some(expected) {
                warn!(command = %request.command, "IPC request rejected: invalid auth token");
                return IpcResponse::error("unauthorized");
            }
        }

        let limit = request.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        match request.command.as_str() {
            "tick" => IpcResponse::from_result(relay.tick().await),
            "report" => IpcResponse::from_result(relay.run_job(DailyJob::StatusReport).await),
            "digest" => IpcResponse::from_result(relay.run_job(DailyJob::DigestThread).await),
            "birthdays" => IpcResponse::from_result(relay.run_job(DailyJob::BirthdayCheck).await),
            "publish" => match request.id {
                Some(id) => IpcResponse::from_result(relay.publish(id).await),
                None => IpcResponse::error("missing required 'id' field"),
            },
            "publish-pending" => IpcResponse::from_result(relay.publish_pending().await),
            "posts" => IpcResponse::from_result(relay.posts(limit).await),
            "logs" => IpcResponse::from_result(relay.logs(limit).await),
            "state" => IpcResponse::from_result(relay.state().await),
            "add-birthday" => match (request.name, request.date) {
                (Some(name), Some(date)) => {
                    IpcResponse::from_result(relay.add_birthday(name, date).await)
                }
                _ => IpcResponse::error("missing required 'name' and 'date' fields"),
            },
            "members" => IpcResponse::from_result(relay.members().await),
            "lookup-user" => match request.username {
                Some(username) => IpcResponse::from_result(relay.lookup_user(username).await),
                None => IpcResponse::error("missing required 'username' field"),
            },
            "mentions" => match request.username {
                Some(username) => IpcResponse::from_result(relay.mentions(username).await),
                None => IpcResponse::error("missing required 'username' field"),
            },
            "history" => IpcResponse::from_result(relay.history(limit).await),
            other => IpcResponse::error(format!("unknown command: {other}")),
        }
    }
    .instrument(span)
    .await
}
