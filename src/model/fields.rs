//! Field types and (de)serializers shared by the stored records.
//!
//! Records are written by several generations of the mobile app, so reads
//! are forgiving: numbers stand in for strings, and unparseable timestamps
//! read as absent instead of rejecting the whole record.

use chrono::{DateTime, SecondsFormat, Utc};
use rocket::serde::json::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Creation and last-modification instants of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    #[serde(default, with = "iso_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(now),
            updated_at: None,
        }
    }
}

/// Instants as ISO-8601 strings with millisecond precision, the format the
/// app writes. Anything else reads as `None`.
pub mod iso_time {
    use super::*;

    pub fn serialize<S: Serializer>(
        instant: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match instant {
            Some(t) => serializer.serialize_str(&format(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().and_then(parse))
    }

    pub fn format(instant: &DateTime<Utc>) -> String {
        instant.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// A string field that may have been stored as a number or `null`.
pub fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
