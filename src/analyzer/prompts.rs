//! Prompt templates for the analyzer.

use chrono::NaiveDate;

use crate::models::analysis::Analysis;

/// Poster analysis: classify as single, calendar or recap.
#[must_use]
pub fn poster(today: NaiveDate) -> String {
    format!(
        r#"Analyze this Rotary Club event poster. Today is {today}.
Determine whether it announces a "single" event, a "calendar" of events for a
month or period, or is a "recap" of an event that already happened.

Return a JSON object.

IF "single":
{{"type": "single", "clubName": "...", "speaker": "...", "topic": "...",
  "venue": "...", "date": "YYYY-MM-DD", "startTime": "...", "summary": "...",
  "is_upcoming": true/false}}

IF "calendar":
{{"type": "calendar", "clubName": "Club name without the 'Rotary Club of' prefix",
  "month": "February 2026",
  "events": [{{"date": "YYYY-MM-DD (estimate year if missing)", "title": "...",
              "venue": "...", "time": "..."}}]}}

IF "recap":
{{"type": "recap", "clubName": "...", "title": "...", "summary": "...",
  "highlights": ["one line per highlight"]}}

Return ONLY the JSON string, no markdown."#
    )
}

/// General analysis of text or a non-poster image.
#[must_use]
pub fn general(today: NaiveDate) -> String {
    format!(
        r#"Analyze the following content. Today is {today}.
Return a JSON object with these keys:
- type: "single" if it announces one event, "recap" if it reports on a past event, otherwise "other" (string)
- summary: a short summary (string)
- date: standardized ISO 8601 date, e.g. "2024-05-20T18:30:00" (string)
- is_upcoming: whether the date is in the future relative to today (boolean)
- location: venue or location (string)
- entities: key people or organizations mentioned (array of strings)
- highlights: for recaps only, one line per highlight (array of strings)

Return ONLY the valid JSON with NO markdown formatting."#
    )
}

/// Post text for an analysis.
#[must_use]
pub fn post_text(analysis: &Analysis) -> String {
    let facts = analysis.to_value();
    let guidelines = match analysis {
        Analysis::Recap(_) => {
            "Write the opening post of a thread that recaps this event. \
             Name the club and the event; the highlights follow as replies."
        }
        _ => {
            "Use the format: \"The Rotary Club of [Club Name] will be hosting [Guest] \
             to present on '[Topic]' at [Venue] from [Time].\""
        }
    };
    format!(
        r"You are a professional social media manager for a Rotary Club.
Create an X post (under 280 characters) from the following event facts:

{facts}

Guidelines:
- Structured, informative and formal.
- {guidelines}
- Do NOT use emojis (except a calendar emoji as a header if fitting).
- Do NOT use hashtags.
- Output ONLY the post text."
    )
}

/// Birthday congratulation for a member.
#[must_use]
pub fn congratulation(name: &str) -> String {
    format!(
        r"You are the social media manager of a Rotary Club.
Write a short, warm and formal birthday congratulation (under 240 characters)
for our member {name}. No hashtags. Output ONLY the post text."
    )
}
