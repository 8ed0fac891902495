// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record reconciler: the rider's trip history as the record store sees it.
//!
//! The reconciler is the only path by which local state converges with the
//! store. It fetches, normalizes and sorts the record list; day buckets are
//! derived on demand from the sorted list and never stored.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::{Arc, RwLock};

use crate::error::{AppError, Result};
use crate::models::PunchRecord;
use crate::services::record_api::RecordApi;
use crate::services::shapes::match_records;
use crate::session::Session;
use crate::time_utils::start_of_day;

/// Fetches and holds the rider's visible history.
pub struct Reconciler {
    api: Arc<dyn RecordApi>,
    session: Arc<Session>,
    history: RwLock<Vec<PunchRecord>>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn RecordApi>, session: Arc<Session>) -> Self {
        Self {
            api,
            session,
            history: RwLock::new(Vec::new()),
        }
    }

    /// Re-fetch the rider's records and replace the visible history.
    ///
    /// On failure the previous history is kept.
    pub async fn refresh(&self) -> Result<Vec<PunchRecord>> {
        let bearer = self.session.bearer()?;
        let user_id = self.session.user_id();

        let response = self
            .api
            .fetch_records(bearer, user_id)
            .await
            .map_err(|e| AppError::FetchFailed(e.to_string()))?;

        if response.is_auth_failure() {
            return Err(AppError::NotAuthenticated);
        }
        if !response.is_success() {
            return Err(AppError::FetchFailed(format!("HTTP {}", response.status)));
        }

        let mut records = normalize_records(&response.body);
        sort_by_recency(&mut records);

        if !self.session.is_live() {
            tracing::debug!("Session ended during refresh, discarding records");
            return Ok(records);
        }

        tracing::debug!(user_id, count = records.len(), "Trip history refreshed");
        *self.history.write().unwrap_or_else(|e| e.into_inner()) = records.clone();
        Ok(records)
    }

    /// Most recently fetched history, newest first.
    pub fn history(&self) -> Vec<PunchRecord> {
        self.history
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current history grouped by day relative to `now`.
    pub fn buckets<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RecordBuckets {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        bucket_by_day(&history, now)
    }
}

/// Turn any accepted payload shape into records.
///
/// Unrecognized payloads give an empty list. Individual entries that do not
/// parse as records are skipped.
pub fn normalize_records(body: &Value) -> Vec<PunchRecord> {
    let Some((shape, raw)) = match_records(body) else {
        tracing::warn!("Record payload matched no known shape, showing no records");
        return Vec::new();
    };
    tracing::trace!(?shape, count = raw.len(), "Record payload matched");

    raw.into_iter()
        .filter_map(|entry| match serde_json::from_value::<PunchRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}

/// Sort newest first by start time.
///
/// The sort is stable. Records whose start time does not parse go last.
pub fn sort_by_recency(records: &mut [PunchRecord]) {
    records.sort_by_key(|r| std::cmp::Reverse(r.started_at()));
}

/// Records grouped for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBuckets {
    pub today: Vec<PunchRecord>,
    pub yesterday: Vec<PunchRecord>,
    pub earlier: Vec<PunchRecord>,
}

impl RecordBuckets {
    pub fn len(&self) -> usize {
        self.today.len() + self.yesterday.len() + self.earlier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split sorted records by local day.
///
/// Day boundaries are midnights in `now`'s time zone, computed once. A
/// record starting exactly at midnight belongs to the day that begins then.
pub fn bucket_by_day<Tz: TimeZone>(records: &[PunchRecord], now: &DateTime<Tz>) -> RecordBuckets {
    let tz = now.timezone();
    let today = now.date_naive();
    let today_start: Option<DateTime<Utc>> =
        start_of_day(today, &tz).map(|dt| dt.with_timezone(&Utc));
    let yesterday_start: Option<DateTime<Utc>> = today
        .pred_opt()
        .and_then(|d| start_of_day(d, &tz))
        .map(|dt| dt.with_timezone(&Utc));

    let mut buckets = RecordBuckets::default();
    for record in records {
        let started = record.started_at();
        let bucket = match (started, today_start, yesterday_start) {
            (Some(t), Some(start), _) if t >= start => &mut buckets.today,
            (Some(t), _, Some(start)) if t >= start => &mut buckets.yesterday,
            _ => &mut buckets.earlier,
        };
        bucket.push(record.clone());
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StopId;
    use chrono::FixedOffset;
    use serde_json::json;

    fn record(id: &str, start: &str) -> PunchRecord {
        PunchRecord {
            record_id: id.to_string(),
            user_id: "rider".to_string(),
            start_stop: StopId::new("Main St"),
            start_time: start.to_string(),
            end_stop: None,
            end_time: None,
        }
    }

    fn ids(records: &[PunchRecord]) -> Vec<&str> {
        records.iter().map(|r| r.record_id.as_str()).collect()
    }

    #[test]
    fn test_sort_newest_first_and_stable() {
        let mut records = vec![
            record("a", "2024-05-01T08:00:00Z"),
            record("b", "2024-05-02T08:00:00Z"),
            record("c", "garbage"),
            record("d", "2024-05-01T08:00:00Z"),
            record("e", "2024-05-02T16:00:00+08:00"), // same instant as b
        ];

        sort_by_recency(&mut records);

        assert_eq!(ids(&records), vec!["b", "e", "a", "d", "c"]);
    }

    #[test]
    fn test_bucket_boundaries_at_local_midnight() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();

        let records = vec![
            record("today-midnight", "2024-05-02T00:00:00+08:00"),
            record("before-midnight", "2024-05-01T23:59:59+08:00"),
            record("yesterday-midnight", "2024-05-01T00:00:00+08:00"),
            record("earlier", "2024-04-30T23:59:59+08:00"),
            record("unparseable", "n/a"),
        ];

        let buckets = bucket_by_day(&records, &now);

        assert_eq!(ids(&buckets.today), vec!["today-midnight"]);
        assert_eq!(
            ids(&buckets.yesterday),
            vec!["before-midnight", "yesterday-midnight"]
        );
        assert_eq!(ids(&buckets.earlier), vec!["earlier", "unparseable"]);
        assert_eq!(buckets.len(), 5);
    }

    #[test]
    fn test_normalize_skips_malformed_entries() {
        let body = json!({"body": {"records": [
            {"recordId": "1", "userId": "rider", "startStop": "A", "startTime": "2024-05-02T08:00:00Z"},
            {"recordId": "2"},
            "junk"
        ]}});

        let records = normalize_records(&body);
        assert_eq!(ids(&records), vec!["1"]);
    }

    #[test]
    fn test_normalize_unknown_shape_is_empty() {
        assert!(normalize_records(&json!({"message": "Internal server error"})).is_empty());
        assert!(normalize_records(&Value::Null).is_empty());
    }
}
