// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard aggregation from the record store's per-user counts.

use serde_json::{Map, Number, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Leaderboard, RankingEntry};
use crate::services::record_api::RecordApi;
use crate::services::shapes::{match_aggregate, RESERVED_KEYS};
use crate::session::Session;

/// Why no leaderboard could be shown.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    /// Loaded fine, but nobody has any trips yet.
    #[error("No leaderboard data yet")]
    Empty,

    #[error(transparent)]
    Load(#[from] AppError),
}

/// Loads the cross-user leaderboard on request.
pub struct LeaderboardService {
    api: Arc<dyn RecordApi>,
    session: Arc<Session>,
}

impl LeaderboardService {
    pub fn new(api: Arc<dyn RecordApi>, session: Arc<Session>) -> Self {
        Self { api, session }
    }

    /// Fetch the aggregate and rank it. Nothing is cached between loads.
    pub async fn load(&self) -> Result<Leaderboard, LeaderboardError> {
        let bearer = self.session.bearer()?;
        let response = self
            .api
            .fetch_aggregate(bearer)
            .await
            .map_err(|e| AppError::FetchFailed(e.to_string()))?;

        if response.is_auth_failure() {
            return Err(AppError::NotAuthenticated.into());
        }
        if !response.is_success() {
            return Err(AppError::FetchFailed(format!("HTTP {}", response.status)).into());
        }

        let entries = aggregate(&response.body);
        tracing::debug!(entries = entries.len(), "Leaderboard aggregated");
        Leaderboard::from_sorted(entries).ok_or(LeaderboardError::Empty)
    }
}

/// Rank a raw aggregate payload, highest count first.
///
/// Reserved envelope keys are skipped and values that are not counts are
/// dropped. Ranking uses the value as sent, so 4.8 places above 4.2 even
/// though both show as 4. Equal values keep the payload's key order.
pub fn aggregate(payload: &Value) -> Vec<RankingEntry> {
    let Some((shape, map)) = match_aggregate(payload) else {
        tracing::warn!("Aggregate payload matched no known shape");
        return Vec::new();
    };
    tracing::trace!(?shape, keys = map.len(), "Aggregate payload matched");

    let mut ranked = collect_entries(&map);
    ranked.sort_by(|(a_raw, a), (b_raw, b)| {
        b_raw.total_cmp(a_raw).then_with(|| b.count.cmp(&a.count))
    });
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

fn collect_entries(map: &Map<String, Value>) -> Vec<(f64, RankingEntry)> {
    map.iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| match coerce_count(value) {
            Some((count, raw)) => Some((raw, RankingEntry::new(key.clone(), count))),
            None => {
                tracing::debug!(user_id = %key, "Dropping non-numeric count");
                None
            }
        })
        .collect()
}

/// Displayed count plus the value to rank by.
///
/// Numbers rank by their own value and display truncated; strings go through
/// [`parse_int_prefix`]; anything else is not a count.
fn coerce_count(value: &Value) -> Option<(i64, f64)> {
    match value {
        Value::Number(n) => number_to_count(n),
        Value::String(s) => parse_int_prefix(s).map(|i| (i, i as f64)),
        _ => None,
    }
}

fn number_to_count(n: &Number) -> Option<(i64, f64)> {
    let raw = n.as_f64()?;
    if let Some(i) = n.as_i64() {
        return Some((i, raw));
    }
    if raw.is_finite() && raw.abs() < i64::MAX as f64 {
        Some((raw.trunc() as i64, raw))
    } else {
        None
    }
}

/// Base-10 integer prefix, `parseInt` style: leading whitespace and one sign
/// are allowed, parsing stops at the first non-digit, at least one digit is
/// required.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
