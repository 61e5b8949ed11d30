//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so the
//! bootstrap is safe to re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS post (
    id               TEXT PRIMARY KEY NOT NULL,
    source_url       TEXT NOT NULL,
    raw_text         TEXT NOT NULL,
    image_ref        TEXT,
    analysis         TEXT,
    generated_text   TEXT,
    status           TEXT NOT NULL CHECK(status IN ('pending','posted','failed')),
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    published_at     TEXT,
    external_id      TEXT,
    event_date       TEXT,
    content_hash     TEXT,
    publish_attempts INTEGER NOT NULL DEFAULT 0,
    last_error       TEXT,
    CHECK(status <> 'posted' OR published_at IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS log_entry (
    id          TEXT PRIMARY KEY NOT NULL,
    module      TEXT NOT NULL,
    message     TEXT NOT NULL,
    context     TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS member_birthday (
    id                    TEXT PRIMARY KEY NOT NULL,
    name                  TEXT NOT NULL UNIQUE,
    birthday              TEXT NOT NULL,
    last_celebrated_year  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS scheduler_state (
    id                    INTEGER PRIMARY KEY CHECK(id = 1),
    cursor                INTEGER NOT NULL DEFAULT 0,
    last_report_day       TEXT,
    last_digest_day       TEXT,
    last_birthday_day     TEXT,
    poll_failure_count    INTEGER NOT NULL DEFAULT 0,
    last_poll_success_at  TEXT,
    version               INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_post_event_date ON post(event_date);
CREATE INDEX IF NOT EXISTS idx_post_status ON post(status);
CREATE INDEX IF NOT EXISTS idx_post_created ON post(created_at);
CREATE INDEX IF NOT EXISTS idx_log_created ON log_entry(created_at);
CREATE INDEX IF NOT EXISTS idx_member_birthday ON member_birthday(birthday);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
