// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-held trip state and the pure start/end classification.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AppError;
use crate::models::StopId;

/// Whether the rider is between stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TripState {
    #[default]
    Inactive,
    Active {
        start_stop: StopId,
        /// Wall-clock time of the start event (Unix millis)
        started_at_millis: i64,
    },
}

/// What a scan at a stop means for the current trip state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Record a new trip start. `abandoned` is set when an expired open trip
    /// is silently dropped.
    Start { abandoned: Option<AbandonedTrip> },
    /// Close the trip that started at `start_stop`.
    End { start_stop: StopId, elapsed_ms: i64 },
}

/// An open trip that outlived the window and will not be closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedTrip {
    pub start_stop: StopId,
    pub elapsed_ms: i64,
}

impl TripState {
    pub fn active(start_stop: StopId, started_at_millis: i64) -> Self {
        TripState::Active {
            start_stop,
            started_at_millis,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TripState::Active { .. })
    }

    /// Decide whether a scan at `stop` starts or ends a trip.
    ///
    /// An active trip is ended only while `now - started_at <= window`. A
    /// scan at the start stop inside the window is rejected.
    pub fn classify(
        &self,
        stop: &StopId,
        now_millis: i64,
        window: Duration,
    ) -> Result<Transition, AppError> {
        let TripState::Active {
            start_stop,
            started_at_millis,
        } = self
        else {
            return Ok(Transition::Start { abandoned: None });
        };

        let elapsed_ms = now_millis.saturating_sub(*started_at_millis);
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);

        if elapsed_ms > window_ms {
            return Ok(Transition::Start {
                abandoned: Some(AbandonedTrip {
                    start_stop: start_stop.clone(),
                    elapsed_ms,
                }),
            });
        }

        if start_stop == stop {
            return Err(AppError::SameStartEndStop(stop.clone()));
        }

        Ok(Transition::End {
            start_stop: start_stop.clone(),
            elapsed_ms,
        })
    }
}

/// Persisted form of [`TripState`]: three independent optional fields.
///
/// Anything other than a fully-populated active record reads back as
/// [`TripState::Inactive`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTripState {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub start_stop: Option<StopId>,
    #[serde(default)]
    pub started_at_millis: Option<i64>,
}

impl From<PersistedTripState> for TripState {
    fn from(persisted: PersistedTripState) -> Self {
        match persisted {
            PersistedTripState {
                active: true,
                start_stop: Some(start_stop),
                started_at_millis: Some(started_at_millis),
            } => TripState::Active {
                start_stop,
                started_at_millis,
            },
            _ => TripState::Inactive,
        }
    }
}

impl From<&TripState> for PersistedTripState {
    fn from(state: &TripState) -> Self {
        match state {
            TripState::Inactive => PersistedTripState::default(),
            TripState::Active {
                start_stop,
                started_at_millis,
            } => PersistedTripState {
                active: true,
                start_stop: Some(start_stop.clone()),
                started_at_millis: Some(*started_at_millis),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(90 * 60);
    const MINUTE_MS: i64 = 60_000;

    fn stop(name: &str) -> StopId {
        StopId::new(name)
    }

    #[test]
    fn test_inactive_always_starts() {
        let transition = TripState::Inactive
            .classify(&stop("A"), 1_000, WINDOW)
            .unwrap();
        assert_eq!(transition, Transition::Start { abandoned: None });
    }

    #[test]
    fn test_active_within_window_ends_at_other_stop() {
        let state = TripState::active(stop("A"), 0);
        let transition = state.classify(&stop("B"), 30 * MINUTE_MS, WINDOW).unwrap();

        assert_eq!(
            transition,
            Transition::End {
                start_stop: stop("A"),
                elapsed_ms: 30 * MINUTE_MS
            }
        );
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let state = TripState::active(stop("A"), 0);

        let at_limit = state.classify(&stop("B"), 90 * MINUTE_MS, WINDOW).unwrap();
        assert!(matches!(at_limit, Transition::End { .. }));

        let past_limit = state
            .classify(&stop("B"), 90 * MINUTE_MS + 1, WINDOW)
            .unwrap();
        assert!(matches!(past_limit, Transition::Start { abandoned: Some(_) }));
    }

    #[test]
    fn test_same_stop_within_window_is_rejected() {
        let state = TripState::active(stop("A"), 0);
        let err = state.classify(&stop("A"), MINUTE_MS, WINDOW).unwrap_err();
        assert!(matches!(err, AppError::SameStartEndStop(s) if s == stop("A")));
    }

    #[test]
    fn test_expired_trip_restarts_even_at_same_stop() {
        let state = TripState::active(stop("A"), 0);
        let transition = state
            .classify(&stop("A"), 3 * 24 * 60 * MINUTE_MS, WINDOW)
            .unwrap();

        assert_eq!(
            transition,
            Transition::Start {
                abandoned: Some(AbandonedTrip {
                    start_stop: stop("A"),
                    elapsed_ms: 3 * 24 * 60 * MINUTE_MS
                })
            }
        );
    }

    #[test]
    fn test_half_filled_persisted_state_reads_inactive() {
        let missing_time = PersistedTripState {
            active: true,
            start_stop: Some(stop("A")),
            started_at_millis: None,
        };
        assert_eq!(TripState::from(missing_time), TripState::Inactive);

        let flag_cleared = PersistedTripState {
            active: false,
            start_stop: Some(stop("A")),
            started_at_millis: Some(5),
        };
        assert_eq!(TripState::from(flag_cleared), TripState::Inactive);
    }

    #[test]
    fn test_persisted_state_matches_json_layout() {
        let state = TripState::active(stop("Harbor"), 1_714_650_000_000);
        let json = serde_json::to_value(PersistedTripState::from(&state)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "active": true,
                "startStop": "Harbor",
                "startedAtMillis": 1_714_650_000_000i64
            })
        );
        let back: PersistedTripState = serde_json::from_value(json).unwrap();
        assert_eq!(TripState::from(back), state);
    }
}
