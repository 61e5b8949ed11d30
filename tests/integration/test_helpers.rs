//! Shared fakes and construction helpers for relay integration tests.
//!
//! The fakes record every call and fail on demand, so tests can assert the
//! exact collaborator traffic a scenario produces.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use event_herald::analyzer::{Analyzer, ImageMode};
use event_herald::collector::{Collector, SentMessage, SourceItem};
use event_herald::config::GlobalConfig;
use event_herald::models::analysis::Analysis;
use event_herald::models::post::MediaRef;
use event_herald::orchestrator::relay::{Relay, RelayDeps};
use event_herald::persistence::db::{self, Database};
use event_herald::publisher::{Media, Mention, Publisher};
use event_herald::{AppError, BoxFuture, Result};

/// Source channel used by every test config.
pub const CHANNEL: &str = "-1001234567890";

/// Build a minimal valid config for tests.
pub fn test_config() -> GlobalConfig {
    let toml = format!(
        r#"
db_path = "unused.db"
source_channel_id = "{CHANNEL}"
http_port = 0
ipc_name = "event-herald-test"

[schedule]
timezone_offset_hours = 3
heartbeat_interval_seconds = 300
report_hour = 0
digest_hour = 6
birthday_hour = 8
"#
    );
    GlobalConfig::from_toml_str(&toml).expect("valid test config")
}

/// UTC instant of a local (UTC+3) wall-clock time.
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    let offset = chrono::FixedOffset::east_opt(3 * 3600).expect("offset");
    offset
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .expect("valid local time")
        .with_timezone(&Utc)
}

/// A plain-text item from the source channel.
pub fn text_item(cursor: i64, message_id: i64, text: &str) -> SourceItem {
    SourceItem {
        cursor,
        chat_id: CHANNEL.to_owned(),
        message_id,
        text: text.to_owned(),
        media: None,
        date: None,
    }
}

/// A photo item from the source channel.
pub fn photo_item(cursor: i64, message_id: i64, caption: &str, file_id: &str) -> SourceItem {
    SourceItem {
        media: Some(MediaRef {
            file_id: file_id.to_owned(),
            mime_type: "image/jpeg".to_owned(),
        }),
        ..text_item(cursor, message_id, caption)
    }
}

/// Analyzer JSON for a single upcoming event dated `date`.
pub fn single_json(date: &str, upcoming: bool) -> String {
    format!(
        r#"{{"type":"single","clubName":"Rotaract","topic":"Networking night","date":"{date}","is_upcoming":{upcoming},"summary":"An evening of networking"}}"#
    )
}

/// Analyzer JSON for a calendar with two entries.
pub fn calendar_json() -> String {
    r#"```json
{"type":"calendar","clubName":"Rotaract","month":"March 2026","events":[
  {"date":"2026-03-05","title":"Blood drive","venue":"City Hall","time":"10:00"},
  {"date":"2026-03-19","title":"Career talk"}
]}
```"#
        .to_owned()
}

// ── Collector ───────────────────────────────────────────

/// Scripted source channel.
#[derive(Default)]
pub struct FakeCollector {
    /// Every update the source knows about; polls return those past the cursor.
    pub feed: Mutex<Vec<SourceItem>>,
    /// Number of upcoming polls that fail.
    pub failing_polls: AtomicU32,
    /// Cursors passed to `poll_updates`.
    pub polls: Mutex<Vec<i64>>,
    /// `(channel, text)` of every sent message.
    pub sent: Mutex<Vec<(String, String)>>,
    /// `(channel, message id)` of every pin.
    pub pinned: Mutex<Vec<(String, i64)>>,
    /// File ids whose download fails.
    pub broken_media: Mutex<HashSet<String>>,
    /// Whether `pin_message` fails.
    pub fail_pin: AtomicBool,
}

impl FakeCollector {
    pub fn push(&self, item: SourceItem) {
        self.feed.lock().unwrap().push(item);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Collector for FakeCollector {
    fn poll_updates(&self, since_cursor: i64) -> BoxFuture<'_, Vec<SourceItem>> {
        Box::pin(async move {
            self.polls.lock().unwrap().push(since_cursor);
            let failing = self.failing_polls.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_polls.store(failing - 1, Ordering::SeqCst);
                return Err(AppError::Collector("source unreachable".into()));
            }
            Ok(self
                .feed
                .lock()
                .unwrap()
                .iter()
                .filter(|item| item.cursor > since_cursor)
                .cloned()
                .collect())
        })
    }

    fn fetch_history(&self, channel: &str, limit: u32) -> BoxFuture<'_, Vec<SourceItem>> {
        let channel = channel.to_owned();
        Box::pin(async move {
            let feed = self.feed.lock().unwrap();
            let items: Vec<SourceItem> = feed.iter().filter(|i| i.chat_id == channel).cloned().collect();
            let skip = items.len().saturating_sub(limit as usize);
            Ok(items.into_iter().skip(skip).collect())
        })
    }

    fn download_media(&self, media: &MediaRef) -> BoxFuture<'_, Option<Bytes>> {
        let file_id = media.file_id.clone();
        Box::pin(async move {
            if self.broken_media.lock().unwrap().contains(&file_id) {
                return Err(AppError::Collector(format!("download of {file_id} failed")));
            }
            Ok(Some(Bytes::from(format!("bytes-of-{file_id}"))))
        })
    }

    fn send_message(&self, channel: &str, text: &str) -> BoxFuture<'_, SentMessage> {
        let (channel, text) = (channel.to_owned(), text.to_owned());
        Box::pin(async move {
            let mut sent = self.sent.lock().unwrap();
            sent.push((channel, text));
            Ok(SentMessage {
                id: i64::try_from(sent.len()).unwrap() + 900,
            })
        })
    }

    fn pin_message(&self, channel: &str, id: i64) -> BoxFuture<'_, ()> {
        let channel = channel.to_owned();
        Box::pin(async move {
            if self.fail_pin.load(Ordering::SeqCst) {
                return Err(AppError::Collector("not enough rights to pin".into()));
            }
            self.pinned.lock().unwrap().push((channel, id));
            Ok(())
        })
    }
}

// ── Analyzer ────────────────────────────────────────────

/// Scripted analyzer; a `None` response makes the call fail.
pub struct FakeAnalyzer {
    pub text_response: Mutex<Option<String>>,
    pub image_response: Mutex<Option<String>>,
    pub render_response: Mutex<Option<String>>,
    pub congratulation_response: Mutex<Option<String>>,
    /// Names of the methods called, in order.
    pub calls: Mutex<Vec<&'static str>>,
    /// Image modes requested.
    pub image_modes: Mutex<Vec<ImageMode>>,
}

impl Default for FakeAnalyzer {
    fn default() -> Self {
        Self {
            text_response: Mutex::new(Some(single_json("2026-03-20", true))),
            image_response: Mutex::new(Some(single_json("2026-03-20", true))),
            render_response: Mutex::new(Some("Join Rotaract for a networking night!".into())),
            congratulation_response: Mutex::new(Some("Happy birthday from the club!".into())),
            calls: Mutex::new(Vec::new()),
            image_modes: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAnalyzer {
    pub fn set_text(&self, response: Option<String>) {
        *self.text_response.lock().unwrap() = response;
    }

    pub fn set_image(&self, response: Option<String>) {
        *self.image_response.lock().unwrap() = response;
    }

    pub fn set_render(&self, response: Option<String>) {
        *self.render_response.lock().unwrap() = response;
    }

    pub fn set_congratulation(&self, response: Option<String>) {
        *self.congratulation_response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: &'static str, slot: &Mutex<Option<String>>) -> Result<String> {
        self.calls.lock().unwrap().push(call);
        slot.lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Analyzer(format!("{call} unavailable")))
    }
}

impl Analyzer for FakeAnalyzer {
    fn analyze_text(&self, _text: &str) -> BoxFuture<'_, String> {
        Box::pin(async move { self.answer("analyze_text", &self.text_response) })
    }

    fn analyze_image(
        &self,
        _bytes: &[u8],
        _mime_type: &str,
        mode: ImageMode,
    ) -> BoxFuture<'_, String> {
        Box::pin(async move {
            self.image_modes.lock().unwrap().push(mode);
            self.answer("analyze_image", &self.image_response)
        })
    }

    fn render_post_text(&self, _analysis: &Analysis) -> BoxFuture<'_, String> {
        Box::pin(async move { self.answer("render_post_text", &self.render_response) })
    }

    fn render_congratulation(&self, _name: &str) -> BoxFuture<'_, String> {
        Box::pin(async move {
            self.answer("render_congratulation", &self.congratulation_response)
        })
    }
}

// ── Publisher ───────────────────────────────────────────

/// One recorded publisher call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub text: String,
    pub media: Option<String>,
    pub reply_to: Option<String>,
}

/// Recording publisher; call `n` (0-based) returns id `tw-{n+1}` unless scripted to fail.
#[derive(Default)]
pub struct FakePublisher {
    pub calls: Mutex<Vec<PublishCall>>,
    /// 0-based indices of calls that fail.
    pub failing_calls: Mutex<HashSet<usize>>,
    /// Whether every call fails.
    pub fail_all: AtomicBool,
}

impl FakePublisher {
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_call(&self, index: usize) {
        self.failing_calls.lock().unwrap().insert(index);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: PublishCall) -> Result<String> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        calls.push(call);
        if self.fail_all.load(Ordering::SeqCst) || self.failing_calls.lock().unwrap().contains(&index)
        {
            return Err(AppError::Publisher(format!("call {index} rejected")));
        }
        Ok(format!("tw-{}", index + 1))
    }
}

impl Publisher for FakePublisher {
    fn post_text(&self, text: &str, reply_to: Option<&str>) -> BoxFuture<'_, String> {
        let call = PublishCall {
            text: text.to_owned(),
            media: None,
            reply_to: reply_to.map(str::to_owned),
        };
        Box::pin(async move { self.record(call) })
    }

    fn publish(
        &self,
        text: &str,
        media: Option<&Media>,
        reply_to: Option<&str>,
    ) -> BoxFuture<'_, String> {
        let call = PublishCall {
            text: text.to_owned(),
            media: media.map(|m| String::from_utf8_lossy(&m.bytes).into_owned()),
            reply_to: reply_to.map(str::to_owned),
        };
        Box::pin(async move { self.record(call) })
    }

    fn lookup_user(&self, username: &str) -> BoxFuture<'_, String> {
        let username = username.to_owned();
        Box::pin(async move {
            if username == "ghost" {
                return Err(AppError::NotFound(format!("user {username}")));
            }
            Ok(format!("uid-{username}"))
        })
    }

    fn list_mentions(&self, user_id: &str) -> BoxFuture<'_, Vec<Mention>> {
        let user_id = user_id.to_owned();
        Box::pin(async move {
            Ok(vec![Mention {
                id: "m-1".into(),
                text: format!("hello {user_id}"),
                author_id: Some("a-1".into()),
            }])
        })
    }
}

// ── Harness ─────────────────────────────────────────────

/// A relay wired to fakes over an in-memory database.
pub struct Harness {
    pub relay: Relay,
    pub db: Arc<Database>,
    pub collector: Arc<FakeCollector>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub publisher: Arc<FakePublisher>,
}

/// Build a fresh harness.
pub async fn harness() -> Harness {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    harness_on(db).await
}

/// Build a harness over an existing database, as after a restart.
pub async fn harness_on(db: Arc<Database>) -> Harness {
    let collector = Arc::new(FakeCollector::default());
    let analyzer = Arc::new(FakeAnalyzer::default());
    let publisher = Arc::new(FakePublisher::default());
    let relay = Relay::new(RelayDeps {
        config: Arc::new(test_config()),
        db: Arc::clone(&db),
        collector: Arc::clone(&collector) as Arc<dyn Collector>,
        analyzer: Arc::clone(&analyzer) as Arc<dyn Analyzer>,
        publisher: Arc::clone(&publisher) as Arc<dyn Publisher>,
    })
    .await
    .expect("relay");

    Harness {
        relay,
        db,
        collector,
        analyzer,
        publisher,
    }
}

/// Parse a `YYYY-MM-DD` literal.
pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}
