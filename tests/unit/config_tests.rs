//! Unit tests for configuration parsing and validation.

use std::path::PathBuf;

use event_herald::config::GlobalConfig;
use event_herald::AppError;

const MINIMAL: &str = r#"
db_path = "data/herald.db"
source_channel_id = "-1001234567890"
"#;

#[test]
fn minimal_config_takes_defaults() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("valid config");

    assert_eq!(config.http_port, 8787);
    assert_eq!(config.ipc_name, "event-herald");
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.schedule.timezone_offset_hours, 3);
    assert_eq!(config.schedule.heartbeat_interval_seconds, 300);
    assert_eq!(config.schedule.report_hour, 0);
    assert_eq!(config.schedule.digest_hour, 6);
    assert_eq!(config.schedule.birthday_hour, 8);
    assert_eq!(config.analyzer.model, "gemini-2.5-flash");
    assert!(config.telegram_bot_token.is_empty());
}

#[test]
fn overrides_are_read() {
    let raw = format!(
        "{MINIMAL}
http_port = 9000

[schedule]
timezone_offset_hours = -5
digest_hour = 7

[publisher]
account_username = \"rotaract\"
"
    );
    let config = GlobalConfig::from_toml_str(&raw).expect("valid config");

    assert_eq!(config.http_port, 9000);
    assert_eq!(config.schedule.digest_hour, 7);
    assert_eq!(config.schedule.birthday_hour, 8);
    assert_eq!(
        config.schedule.timezone().expect("offset").local_minus_utc(),
        -5 * 3600
    );
    assert_eq!(config.publisher.account_username, "rotaract");
}

#[test]
fn empty_channel_is_rejected() {
    let raw = "db_path = \"x.db\"\nsource_channel_id = \"  \"\n";
    let err = GlobalConfig::from_toml_str(raw).expect_err("must fail");
    assert!(matches!(err, AppError::Config(msg) if msg.contains("source_channel_id")));
}

#[test]
fn zero_heartbeat_is_rejected() {
    let raw = format!("{MINIMAL}\n[schedule]\nheartbeat_interval_seconds = 0\n");
    assert!(matches!(
        GlobalConfig::from_toml_str(&raw),
        Err(AppError::Config(msg)) if msg.contains("heartbeat_interval_seconds")
    ));
}

#[test]
fn out_of_range_hour_is_rejected() {
    let raw = format!("{MINIMAL}\n[schedule]\nbirthday_hour = 24\n");
    assert!(matches!(
        GlobalConfig::from_toml_str(&raw),
        Err(AppError::Config(msg)) if msg.contains("birthday_hour")
    ));
}

#[test]
fn out_of_range_timezone_is_rejected() {
    let raw = format!("{MINIMAL}\n[schedule]\ntimezone_offset_hours = 30\n");
    assert!(matches!(
        GlobalConfig::from_toml_str(&raw),
        Err(AppError::Config(_))
    ));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = GlobalConfig::from_toml_str("db_path = ").expect_err("must fail");
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn missing_file_is_a_config_error() {
    let err = GlobalConfig::load_from_path("/nonexistent/event-herald.toml").expect_err("must fail");
    assert!(matches!(err, AppError::Config(msg) if msg.contains("failed to read config")));
}

#[test]
fn source_url_is_derived_from_the_channel_id() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("valid config");
    assert_eq!(config.source_url(42), "https://t.me/c/1234567890/42");

    let raw = format!("{MINIMAL}source_url_prefix = \"https://t.me/rotaract/\"\n");
    let config = GlobalConfig::from_toml_str(&raw).expect("valid config");
    assert_eq!(config.source_url(42), "https://t.me/rotaract/42");
}

#[test]
fn ipc_token_sits_next_to_the_database() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("valid config");
    assert_eq!(config.ipc_token_path(), PathBuf::from("data/herald.ipc-token"));
}
