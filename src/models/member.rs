//! Member birthday records used by the congratulation job.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member whose birthday is celebrated once per calendar year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberBirthday {
    /// Unique record identifier.
    pub id: String,
    /// Display name used in the congratulation.
    pub name: String,
    /// Birthday as `MM-DD`.
    pub birthday: String,
    /// Year of the last congratulation; 0 when never celebrated.
    pub last_celebrated_year: i32,
}

impl MemberBirthday {
    /// Construct a member that has never been celebrated.
    #[must_use]
    pub fn new(name: String, birthday: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            birthday,
            last_celebrated_year: 0,
        }
    }

    /// Whether the member is still due a congratulation in `year`.
    #[must_use]
    pub fn is_due(&self, year: i32) -> bool {
        self.last_celebrated_year < year
    }
}

/// Normalize a birthday given as `MM-DD`, `YYYY-MM-DD` or `M/D` into `MM-DD`.
///
/// Returns `None` for anything that is not a valid month and day.
#[must_use]
pub fn normalize_birthday(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split(['-', '/']).collect();
    let (month, day) = match parts.as_slice() {
        [year, m, d] if year.len() == 4 => (m.parse::<u32>().ok()?, d.parse::<u32>().ok()?),
        [m, d] => (m.parse::<u32>().ok()?, d.parse::<u32>().ok()?),
        _ => return None,
    };
    // 2024 is a leap year, so 02-29 is accepted.
    chrono::NaiveDate::from_ymd_opt(2024, month, day)?;
    Some(format!("{month:02}-{day:02}"))
}
