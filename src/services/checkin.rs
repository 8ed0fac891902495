// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in state machine.
//!
//! Handles the core workflow:
//! 1. Rider selects a stop (arms scanning)
//! 2. A scan arrives; the scan lock drops duplicates
//! 3. Trip state decides start vs. end
//! 4. The event is submitted
//! 5. On success the new trip state is committed and history refreshed
//!
//! Trip state is only written after a successful submission, and always as
//! a whole.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{AbandonedTrip, PunchRecord, StopCatalog, StopId, Transition, TripState};
use crate::scan::{decode_scan, Detection, TripToken};
use crate::services::reconciler::Reconciler;
use crate::services::record_api::RecordApi;
use crate::services::submission::{SubmissionClient, TripEvent};
use crate::session::Session;

/// How long an open trip can still be ended.
pub const DEFAULT_TRIP_WINDOW: Duration = Duration::from_secs(90 * 60);
/// Quiet period after a scan, to absorb repeat frames of the same code.
pub const DEFAULT_SCAN_COOLDOWN: Duration = Duration::from_millis(1500);

/// Timing rules for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckinPolicy {
    pub trip_window: Duration,
    pub scan_cooldown: Duration,
}

impl Default for CheckinPolicy {
    fn default() -> Self {
        Self {
            trip_window: DEFAULT_TRIP_WINDOW,
            scan_cooldown: DEFAULT_SCAN_COOLDOWN,
        }
    }
}

impl CheckinPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            trip_window: Duration::from_secs(config.trip_window_minutes.saturating_mul(60)),
            scan_cooldown: Duration::from_millis(config.scan_cooldown_ms),
        }
    }
}

/// What happened to a scan that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckinOutcome {
    /// A trip start was recorded.
    Started {
        stop: StopId,
        record: Option<PunchRecord>,
        /// Expired open trip that was dropped in favor of this start
        abandoned: Option<AbandonedTrip>,
    },
    /// The open trip was closed.
    Ended {
        start_stop: StopId,
        end_stop: StopId,
        record: Option<PunchRecord>,
    },
    /// Nothing decodable in the scan.
    NoToken,
    /// Another scan is in flight or the cooldown is running.
    Dropped,
    /// The session ended while the submission was in flight; the result
    /// was not applied.
    Discarded,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scan lock
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LockState {
    processing: bool,
    cooldown_until: Option<Instant>,
}

/// Boolean guard with a trailing cooldown. Not a queue: scans that find it
/// engaged are dropped.
#[derive(Debug, Default)]
struct ScanLock {
    state: Mutex<LockState>,
}

impl ScanLock {
    fn try_acquire(&self, cooldown: Duration) -> Option<ScanLockGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if state.processing || state.cooldown_until.is_some_and(|until| now < until) {
            return None;
        }

        state.processing = true;
        state.cooldown_until = None;
        Some(ScanLockGuard {
            lock: self,
            cooldown,
        })
    }

    /// Forget any running cooldown. An in-flight scan keeps the lock.
    fn reset(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cooldown_until = None;
    }

    fn is_engaged(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.processing
            || state
                .cooldown_until
                .is_some_and(|until| Instant::now() < until)
    }
}

/// Releases the lock into cooldown when processing finishes, however it ends.
struct ScanLockGuard<'a> {
    lock: &'a ScanLock,
    cooldown: Duration,
}

impl Drop for ScanLockGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().unwrap_or_else(|e| e.into_inner());
        state.processing = false;
        state.cooldown_until = Some(Instant::now() + self.cooldown);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CheckinMachine
// ─────────────────────────────────────────────────────────────────────────────

/// The check-in state machine for one session.
///
/// Shared behind an `Arc`; scans may arrive while a previous one is still
/// awaiting the network, and are dropped by the scan lock.
pub struct CheckinMachine {
    session: Arc<Session>,
    submission: SubmissionClient,
    reconciler: Arc<Reconciler>,
    catalog: StopCatalog,
    policy: CheckinPolicy,
    selected: Mutex<Option<StopId>>,
    lock: ScanLock,
}

impl CheckinMachine {
    pub fn new(
        session: Arc<Session>,
        api: Arc<dyn RecordApi>,
        reconciler: Arc<Reconciler>,
        catalog: StopCatalog,
        policy: CheckinPolicy,
    ) -> Self {
        Self {
            submission: SubmissionClient::new(api, Arc::clone(&session)),
            session,
            reconciler,
            catalog,
            policy,
            selected: Mutex::new(None),
            lock: ScanLock::default(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn policy(&self) -> CheckinPolicy {
        self.policy
    }

    pub fn selected_stop(&self) -> Option<StopId> {
        self.selected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn trip_state(&self) -> TripState {
        self.session.trip_state()
    }

    /// Whether a scan arriving now would be dropped.
    pub fn is_scan_locked(&self) -> bool {
        self.lock.is_engaged()
    }

    /// Select the stop the rider is at and arm scanning.
    ///
    /// Resets the scan cooldown and fires the advisory arm call without
    /// waiting for it.
    pub fn select_stop(&self, name: &str) -> Result<StopId> {
        let stop = self.catalog.resolve(name)?;

        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = Some(stop.clone());
        self.lock.reset();
        tracing::info!(stop = %stop, "Stop selected");

        self.spawn_arm(stop.clone());
        Ok(stop)
    }

    /// Feed raw detections from the scan surface.
    pub async fn receive_detections(&self, detections: &[Detection]) -> Result<CheckinOutcome> {
        match decode_scan(detections) {
            Some(token) => self.receive_scan(token).await,
            None => Ok(CheckinOutcome::NoToken),
        }
    }

    /// Process one decoded scan.
    pub async fn receive_scan(&self, token: TripToken) -> Result<CheckinOutcome> {
        let stop = self.selected_stop().ok_or(AppError::NoStopSelected)?;

        let Some(_guard) = self.lock.try_acquire(self.policy.scan_cooldown) else {
            tracing::debug!(stop = %stop, "Scan dropped, lock engaged");
            return Ok(CheckinOutcome::Dropped);
        };

        self.process_scan(stop, token).await
    }

    async fn process_scan(&self, stop: StopId, token: TripToken) -> Result<CheckinOutcome> {
        let now_millis = self.session.now_millis();
        let state = self.session.trip_state();

        let transition = match state.classify(&stop, now_millis, self.policy.trip_window) {
            Ok(t) => t,
            Err(e) => {
                tracing::info!(stop = %stop, error = %e, "Scan rejected");
                return Err(e);
            }
        };

        match transition {
            Transition::End {
                start_stop,
                elapsed_ms,
            } => {
                let event = TripEvent::End {
                    stop: stop.clone(),
                    token,
                };
                let outcome = self.submission.submit(&event).await?;
                let record = outcome.into_result().map_err(AppError::SubmissionFailed)?;

                if !self.session.is_live() {
                    tracing::info!(stop = %stop, "Session ended mid-submission, discarding");
                    return Ok(CheckinOutcome::Discarded);
                }

                // Safe to repeat: an already-inactive state stays inactive.
                self.session.commit_trip_state(&TripState::Inactive)?;
                tracing::info!(
                    user_id = %self.session.user_id(),
                    start_stop = %start_stop,
                    end_stop = %stop,
                    elapsed_ms,
                    "Trip ended"
                );
                self.spawn_refresh();

                Ok(CheckinOutcome::Ended {
                    start_stop,
                    end_stop: stop,
                    record,
                })
            }
            Transition::Start { abandoned } => {
                if let Some(old) = &abandoned {
                    tracing::info!(
                        start_stop = %old.start_stop,
                        elapsed_ms = old.elapsed_ms,
                        "Open trip expired, starting a new one"
                    );
                }

                let event = TripEvent::Start {
                    stop: stop.clone(),
                    token,
                };
                let outcome = self.submission.submit(&event).await?;
                let record = outcome.into_result().map_err(AppError::SubmissionFailed)?;

                if !self.session.is_live() {
                    tracing::info!(stop = %stop, "Session ended mid-submission, discarding");
                    return Ok(CheckinOutcome::Discarded);
                }

                self.session
                    .commit_trip_state(&TripState::active(stop.clone(), now_millis))?;
                tracing::info!(
                    user_id = %self.session.user_id(),
                    start_stop = %stop,
                    "Trip started"
                );
                self.spawn_refresh();

                Ok(CheckinOutcome::Started {
                    stop,
                    record,
                    abandoned,
                })
            }
        }
    }

    /// Fire-and-forget arm call.
    fn spawn_arm(&self, stop: StopId) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(stop = %stop, "No runtime, skipping arm call");
            return;
        };

        let client = self.submission.clone();
        handle.spawn(async move {
            if let Err(e) = client.arm(&stop).await {
                tracing::warn!(stop = %stop, error = %e, "Arm call failed");
            }
        });
    }

    /// Fire-and-forget history refresh.
    fn spawn_refresh(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let reconciler = Arc::clone(&self.reconciler);
        handle.spawn(async move {
            if let Err(e) = reconciler.refresh().await {
                tracing::warn!(error = %e, "History refresh failed");
            }
        });
    }
}
