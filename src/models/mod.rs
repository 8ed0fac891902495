// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod ranking;
pub mod record;
pub mod stop;
pub mod trip_state;

pub use ranking::{Leaderboard, RankingEntry};
pub use record::PunchRecord;
pub use stop::{StopCatalog, StopId};
pub use trip_state::{AbandonedTrip, PersistedTripState, Transition, TripState};
