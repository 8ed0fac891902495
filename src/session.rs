// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-login session context.
//!
//! A `Session` owns the bearer token, the rider identity and the durable
//! client state. It is created when a rider is authenticated and torn down
//! on logout; work still in flight afterwards must check [`Session::is_live`]
//! before committing anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::StateStore;
use crate::error::{AppError, Result};
use crate::identity::{decode_identity, BearerToken, Identity};
use crate::models::TripState;
use crate::time_utils::Clock;

/// Authenticated rider session.
pub struct Session {
    token: BearerToken,
    identity: Identity,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    live: AtomicBool,
}

impl Session {
    /// Resume the session whose token is in `store`.
    ///
    /// A missing, malformed or expired token yields `NotAuthenticated`,
    /// whatever trip state may still be stored.
    pub fn open(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let token = store.load_token()?.ok_or(AppError::NotAuthenticated)?;
        Self::from_token(token, store, clock)
    }

    /// Start a session with a freshly issued token and persist it.
    pub fn login(token: &str, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let session = Self::from_token(token.trim().to_string(), store, clock)?;

        // A different rider must not inherit the previous rider's trip.
        let previous = session.store.load()?;
        let same_rider = previous
            .id_token
            .as_deref()
            .and_then(decode_identity)
            .is_some_and(|prev| prev.user_id == session.identity.user_id);
        if !same_rider {
            session.store.clear()?;
        }

        session.store.save_token(session.token.as_str())?;
        tracing::info!(user_id = %session.identity.user_id, "Session started");
        Ok(session)
    }

    fn from_token(
        token: String,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let identity = decode_identity(&token).ok_or_else(|| {
            tracing::warn!("Stored token is not a readable ID token");
            AppError::NotAuthenticated
        })?;

        if identity.is_expired(clock.now()) {
            tracing::info!(user_id = %identity.user_id, "Token expired");
            return Err(AppError::NotAuthenticated);
        }

        Ok(Self {
            token: BearerToken::new(token),
            identity,
            store,
            clock,
            live: AtomicBool::new(true),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current time as epoch milliseconds, the unit trip state is kept in.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Token to attach to a record API call.
    ///
    /// Fails after logout or once the token's `exp` has passed.
    pub fn bearer(&self) -> Result<&str> {
        if !self.is_live() || self.identity.is_expired(self.clock.now()) {
            return Err(AppError::NotAuthenticated);
        }
        Ok(self.token.as_str())
    }

    /// Current trip state. Unreadable storage counts as no trip.
    pub fn trip_state(&self) -> TripState {
        match self.store.load_trip_state() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "Trip state unreadable, treating as inactive");
                TripState::Inactive
            }
        }
    }

    /// Persist a new trip state as a whole.
    pub fn commit_trip_state(&self, state: &TripState) -> Result<()> {
        self.store.save_trip_state(state)?;
        Ok(())
    }

    /// End the session and wipe client state.
    ///
    /// The session is marked dead first so in-flight work drops its result
    /// even if clearing storage fails.
    pub fn logout(&self) -> Result<()> {
        self.live.store(false, Ordering::Release);
        self.store.clear()?;
        tracing::info!(user_id = %self.identity.user_id, "Session ended");
        Ok(())
    }
}
