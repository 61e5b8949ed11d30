//! Structured event facts extracted by the analyzer.
//!
//! Analyzer output is model-generated text and is treated as untrusted.
//! [`Analysis::parse`] strips markdown fences, parses JSON, classifies the
//! result by its `type` key and validates the per-kind required fields.
//! Parsing never fails: a known kind that does not validate degrades to
//! [`Analysis::Unclassified`], and anything that is not a JSON object
//! yields `None`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Classification of an analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// One event.
    Single,
    /// A poster listing several events for a period.
    Calendar,
    /// A report on a past event with highlights.
    Recap,
    /// Valid facts without a recognized or valid kind.
    Unclassified,
}

/// Facts about a single event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EventFacts {
    /// Hosting club.
    pub club_name: Option<String>,
    /// Guest speaker.
    pub speaker: Option<String>,
    /// Talk or event topic.
    pub topic: Option<String>,
    /// Venue or location.
    #[serde(alias = "location")]
    pub venue: Option<String>,
    /// ISO date or date-time.
    pub date: Option<String>,
    /// Start time as written on the poster.
    pub start_time: Option<String>,
    /// Short summary.
    pub summary: Option<String>,
    /// Key people or organizations.
    pub entities: Vec<String>,
    /// Whether the event lies in the future; `Some(false)` suppresses publication.
    #[serde(rename = "is_upcoming", alias = "isUpcoming")]
    pub is_upcoming: Option<bool>,
    /// Facts the schema does not name.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a calendar poster.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalendarEvent {
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Event title.
    pub title: String,
    /// Venue, if specific.
    pub venue: Option<String>,
    /// Time, if specific.
    pub time: Option<String>,
}

/// Facts from a calendar poster.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CalendarFacts {
    /// Hosting club.
    pub club_name: Option<String>,
    /// Period covered, e.g. "February 2026".
    pub month: Option<String>,
    /// Listed events in poster order.
    pub events: Vec<CalendarEvent>,
    /// Facts the schema does not name.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Facts from an event recap.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RecapFacts {
    /// Hosting club.
    pub club_name: Option<String>,
    /// Event title.
    pub title: Option<String>,
    /// Closing summary.
    pub summary: Option<String>,
    /// Highlight lines, one reply each.
    pub highlights: Vec<String>,
    /// Facts the schema does not name.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Validated analysis result.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// One event.
    Single(EventFacts),
    /// Several events for a period.
    Calendar(CalendarFacts),
    /// Highlights of a past event.
    Recap(RecapFacts),
    /// An object without a usable kind.
    Unclassified(Map<String, Value>),
}

impl Analysis {
    /// Parse raw analyzer output.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.replace("```json", "").replace("```JSON", "").replace("```", "");
        let value: Value = serde_json::from_str(cleaned.trim()).ok()?;
        Self::from_value(value)
    }

    /// Classify and validate a JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase);

        let parsed = match kind.as_deref() {
            Some("single" | "event") => serde_json::from_value::<EventFacts>(Value::Object(
                map.clone(),
            ))
            .ok()
            .filter(|f| non_blank(f.summary.as_ref()) || non_blank(f.topic.as_ref()))
            .map(Self::Single),
            Some("calendar") => {
                serde_json::from_value::<CalendarFacts>(Value::Object(map.clone()))
                    .ok()
                    .filter(|f| {
                        !f.events.is_empty() && f.events.iter().all(|e| !e.title.trim().is_empty())
                    })
                    .map(Self::Calendar)
            }
            Some("recap") => serde_json::from_value::<RecapFacts>(Value::Object(map.clone()))
                .ok()
                .filter(|f| !f.highlights.is_empty())
                .map(Self::Recap),
            _ => None,
        };

        Some(parsed.unwrap_or_else(|| Self::Unclassified(strip_type(map))))
    }

    /// Serialize back into a JSON object carrying its `type` key.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let (kind, body) = match self {
            Self::Single(f) => ("single", serde_json::to_value(f)),
            Self::Calendar(f) => ("calendar", serde_json::to_value(f)),
            Self::Recap(f) => ("recap", serde_json::to_value(f)),
            Self::Unclassified(map) => return Value::Object(map.clone()),
        };
        let mut map = match body {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert("type".into(), Value::String(kind.into()));
        Value::Object(map)
    }

    /// Classification of this analysis.
    #[must_use]
    pub fn kind(&self) -> AnalysisKind {
        match self {
            Self::Single(_) => AnalysisKind::Single,
            Self::Calendar(_) => AnalysisKind::Calendar,
            Self::Recap(_) => AnalysisKind::Recap,
            Self::Unclassified(_) => AnalysisKind::Unclassified,
        }
    }

    /// Normalized event date for single and unclassified analyses.
    #[must_use]
    pub fn event_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Single(f) => f.date.as_deref().and_then(parse_date_prefix),
            Self::Unclassified(map) => map
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_date_prefix),
            Self::Calendar(_) | Self::Recap(_) => None,
        }
    }

    /// Whether the analyzer flagged the event as already past.
    #[must_use]
    pub fn is_past(&self) -> bool {
        match self {
            Self::Single(f) => f.is_upcoming == Some(false),
            Self::Unclassified(map) => map.get("is_upcoming").and_then(Value::as_bool) == Some(false),
            Self::Calendar(_) | Self::Recap(_) => false,
        }
    }
}

impl Serialize for Analysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Analysis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).ok_or_else(|| serde::de::Error::custom("analysis must be an object"))
    }
}

fn non_blank(s: Option<&String>) -> bool {
    s.is_some_and(|s| !s.trim().is_empty())
}

fn strip_type(mut map: Map<String, Value>) -> Map<String, Value> {
    // A kind that failed validation must not be re-read as that kind.
    if let Some(Value::String(kind)) = map.get("type") {
        if matches!(kind.as_str(), "single" | "event" | "calendar" | "recap") {
            let kind = kind.clone();
            map.remove("type");
            map.insert("invalid_type".into(), Value::String(kind));
        }
    }
    map
}

/// Parse the leading `YYYY-MM-DD` of a date or date-time string.
#[must_use]
pub fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    let prefix = s.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}
