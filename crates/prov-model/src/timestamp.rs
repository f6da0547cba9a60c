//! Timestamp (de)serialization
//!
//! Timestamps are written as RFC 3339. Older documents carry the browser's
//! `toUTCString()` form (`Tue, 15 Nov 1994 08:12:31 GMT`), which is RFC 2822
//! compatible, so both are accepted on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Parse either RFC 3339 or RFC 2822 text
#[must_use]
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse(&text).ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp: {text}")))
}
