//! Timestamp comparison used by every "is this update newer" decision.
//!
//! A missing timestamp sorts before every real one, so a record that was never
//! stored always loses the comparison. Comparison is strict: equal timestamps
//! are not "later".

use chrono::{DateTime, NaiveDateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time(Option<DateTime<Utc>>);

impl Time {
    pub fn later_than(&self, other: &Time) -> bool {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a > b,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

pub fn time(value: Option<DateTime<Utc>>) -> Time {
    Time(value)
}

/// Returns whichever of the two timestamps is strictly later, preferring `current` on ties.
pub fn latest(
    current: Option<DateTime<Utc>>,
    candidate: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if time(candidate).later_than(&time(current)) {
        candidate
    } else {
        current
    }
}

/// Accepts RFC 3339 as sent by GitHub, plus the space separated forms that show up
/// in exported fixtures. A value without a zone is taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = value.trim_end_matches('Z');
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Serde adapter for optional GitHub timestamps: `null`, `""` and garbage all become `None`.
pub mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_timestamp))
    }
}
