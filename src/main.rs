#![forbid(unsafe_code)]

//! `event-herald`: relay service binary.
//!
//! Bootstraps configuration, opens the database, builds the Telegram,
//! Gemini and X clients, and runs the relay actor together with the IPC
//! server for `event-herald-ctl` and the HTTP health endpoint.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use event_herald::analyzer::gemini::GeminiAnalyzer;
use event_herald::collector::telegram::TelegramCollector;
use event_herald::config::GlobalConfig;
use event_herald::orchestrator::actor::spawn_relay;
use event_herald::orchestrator::relay::{Relay, RelayDeps};
use event_herald::persistence::{db, retention};
use event_herald::publisher::twitter::TwitterPublisher;
use event_herald::{http, ipc, AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "event-herald", about = "Telegram to X event relay", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("event-herald bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!(channel = %config.source_channel_id, "configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(path = %config.db_path.display(), "database connected");

    // ── Start retention service ──────────────────────────
    let ct = CancellationToken::new();
    let retention_handle =
        retention::spawn_retention_task(Arc::clone(&db), config.retention_days, ct.clone());
    info!("retention service started");

    // ── Build collaborators and the relay actor ─────────
    let relay = Relay::new(RelayDeps {
        config: Arc::clone(&config),
        db: Arc::clone(&db),
        collector: Arc::new(TelegramCollector::new(&config.telegram_bot_token)?),
        analyzer: Arc::new(GeminiAnalyzer::new(&config.analyzer)?),
        publisher: Arc::new(TwitterPublisher::new(&config.publisher)?),
    })
    .await?;
    let interval = Duration::from_secs(config.schedule.heartbeat_interval_seconds);
    let (handle, relay_task) = spawn_relay(relay, interval, ct.clone());

    // ── Start operator surfaces ─────────────────────────
    let auth_token = ipc::issue_auth_token(&config.ipc_token_path())?;
    let ipc_handle = ipc::server::spawn_ipc_server(
        &config.ipc_name,
        handle.clone(),
        Some(auth_token),
        ct.clone(),
    )?;

    let bind = SocketAddr::from((Ipv4Addr::LOCALHOST, config.http_port));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind http on {bind}: {err}")))?;
    let http_ct = ct.clone();
    let http_relay = handle.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve_http(listener, http_relay, http_ct).await {
            error!(%err, "http endpoint failed");
        }
    });

    // The actor starts cold; the first request schedules its heartbeat.
    handle.prime().await?;
    info!("event-herald ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();
    drop(handle);

    let _ = tokio::join!(relay_task, ipc_handle, http_handle, retention_handle);
    info!("event-herald shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
