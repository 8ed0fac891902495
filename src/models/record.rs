//! Punch record model, as returned by the record API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::StopId;
use crate::time_utils::parse_iso8601;

/// One trip row in the remote record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PunchRecord {
    /// Server-assigned id (string or number on the wire)
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub record_id: String,
    pub user_id: String,
    pub start_stop: StopId,
    /// Start time (ISO 8601)
    pub start_time: String,
    #[serde(default)]
    pub end_stop: Option<StopId>,
    /// End time (ISO 8601), absent while the trip is open
    #[serde(default)]
    pub end_time: Option<String>,
}

impl PunchRecord {
    /// An open record has a start but no end yet.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        parse_iso8601(&self.start_time)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.end_time.as_deref().and_then(parse_iso8601)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Uint(n) => n.to_string(),
    })
}
