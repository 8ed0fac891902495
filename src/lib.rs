// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stop check-in: record bus trips by scanning QR codes at stops
//!
//! This crate provides the rider-side core: deciding whether a scan starts
//! or ends a trip, submitting it to the record API, and presenting the
//! rider's history and the cross-user leaderboard.

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod scan;
pub mod services;
pub mod session;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::StateStore;
use error::Result;
use models::StopCatalog;
use services::{CheckinMachine, CheckinPolicy, LeaderboardService, RecordApi, Reconciler};
use session::Session;
use time_utils::Clock;

/// Everything wired up for one authenticated rider.
pub struct AppState {
    pub session: Arc<Session>,
    pub checkin: Arc<CheckinMachine>,
    pub reconciler: Arc<Reconciler>,
    pub leaderboard: LeaderboardService,
}

impl AppState {
    /// Resume the stored session and build its services.
    pub fn open(
        config: &Config,
        api: Arc<dyn RecordApi>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let session = Arc::new(Session::open(store, clock)?);
        Ok(Self::for_session(config, api, session))
    }

    pub fn for_session(config: &Config, api: Arc<dyn RecordApi>, session: Arc<Session>) -> Self {
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&api), Arc::clone(&session)));
        let checkin = Arc::new(CheckinMachine::new(
            Arc::clone(&session),
            Arc::clone(&api),
            Arc::clone(&reconciler),
            StopCatalog::new(config.stops.iter().cloned()),
            CheckinPolicy::from_config(config),
        ));
        let leaderboard = LeaderboardService::new(api, Arc::clone(&session));

        Self {
            session,
            checkin,
            reconciler,
            leaderboard,
        }
    }
}
