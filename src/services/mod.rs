// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod checkin;
pub mod leaderboard;
pub mod reconciler;
pub mod record_api;
pub mod shapes;
pub mod submission;

pub use checkin::{CheckinMachine, CheckinOutcome, CheckinPolicy};
pub use leaderboard::{LeaderboardError, LeaderboardService};
pub use reconciler::{RecordBuckets, Reconciler};
pub use record_api::{ApiResponse, HttpRecordApi, RecordApi, TransportError};
pub use submission::{SubmissionClient, SubmissionOutcome, TripEvent};
