// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record submission client.
//!
//! Sends start/end events with the session's bearer token and classifies
//! the result. It never retries and never touches trip state; both are the
//! check-in machine's call.

use serde_json::Value;
use std::sync::Arc;

use crate::error::{AppError, Result, SubmissionFailure};
use crate::models::{PunchRecord, StopId};
use crate::scan::TripToken;
use crate::services::record_api::{ApiResponse, ArmRequest, EndEvent, RecordApi, StartEvent};
use crate::session::Session;

/// A trip event to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripEvent {
    Start { stop: StopId, token: TripToken },
    End { stop: StopId, token: TripToken },
}

impl TripEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TripEvent::Start { .. } => "start",
            TripEvent::End { .. } => "end",
        }
    }
}

/// Classified outcome of one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Accepted. The record is included when the store echoed it back.
    Success(Option<PunchRecord>),
    Rejected(String),
    TransportFailure(String),
}

impl SubmissionOutcome {
    pub fn into_result(self) -> std::result::Result<Option<PunchRecord>, SubmissionFailure> {
        match self {
            SubmissionOutcome::Success(record) => Ok(record),
            SubmissionOutcome::Rejected(msg) => Err(SubmissionFailure::Rejected(msg)),
            SubmissionOutcome::TransportFailure(msg) => Err(SubmissionFailure::Transport(msg)),
        }
    }
}

/// Submits trip events for the session's rider.
#[derive(Clone)]
pub struct SubmissionClient {
    api: Arc<dyn RecordApi>,
    session: Arc<Session>,
}

impl SubmissionClient {
    pub fn new(api: Arc<dyn RecordApi>, session: Arc<Session>) -> Self {
        Self { api, session }
    }

    /// Submit one event.
    ///
    /// Errors only with `NotAuthenticated`; every other failure is reported
    /// in the outcome.
    pub async fn submit(&self, event: &TripEvent) -> Result<SubmissionOutcome> {
        let bearer = self.session.bearer()?;
        let user_id = self.session.user_id().to_string();

        let response = match event {
            TripEvent::Start { stop, token } => {
                let body = StartEvent {
                    user_id,
                    start_stop: stop.clone(),
                    uuid: token.as_str().to_string(),
                };
                self.api.submit_start(bearer, &body).await
            }
            TripEvent::End { stop, token } => {
                let body = EndEvent {
                    user_id,
                    end_stop: stop.clone(),
                    uuid: token.as_str().to_string(),
                };
                self.api.submit_end(bearer, &body).await
            }
        };

        let outcome = match response {
            Ok(response) => classify_response(&response)?,
            Err(e) => SubmissionOutcome::TransportFailure(e.to_string()),
        };

        match &outcome {
            SubmissionOutcome::Success(_) => {
                tracing::debug!(kind = event.kind(), "Submission accepted");
            }
            SubmissionOutcome::Rejected(msg) => {
                tracing::warn!(kind = event.kind(), message = %msg, "Submission rejected");
            }
            SubmissionOutcome::TransportFailure(cause) => {
                tracing::error!(kind = event.kind(), error = %cause, "Submission transport failure");
            }
        }
        Ok(outcome)
    }

    /// Advisory arm call for a selected stop.
    pub async fn arm(&self, stop: &StopId) -> Result<()> {
        let bearer = self.session.bearer()?;
        let request = ArmRequest {
            user_id: self.session.user_id().to_string(),
            stop: stop.clone(),
        };
        self.api
            .arm(bearer, &request)
            .await
            .map_err(|e| AppError::FetchFailed(e.to_string()))
    }
}

/// Map a record API answer to an outcome.
///
/// 401/403 mean the token was refused. Otherwise a non-2xx HTTP status or an
/// envelope `statusCode >= 300` is a rejection.
pub fn classify_response(response: &ApiResponse) -> Result<SubmissionOutcome> {
    if response.is_auth_failure() {
        return Err(AppError::NotAuthenticated);
    }

    let envelope_status = response.body.get("statusCode").and_then(status_code);
    if let Some(401 | 403) = envelope_status {
        return Err(AppError::NotAuthenticated);
    }

    let rejected_status = if !response.is_success() {
        Some(i64::from(response.status))
    } else {
        envelope_status.filter(|s| *s >= 300)
    };
    if let Some(status) = rejected_status {
        let message = server_message(&response.body).unwrap_or_else(|| format!("HTTP {}", status));
        return Ok(SubmissionOutcome::Rejected(message));
    }

    Ok(SubmissionOutcome::Success(echoed_record(&response.body)))
}

fn status_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Human-readable message from an error body.
///
/// Looks at `message`, `error` and `body` in turn, skipping blank values. A
/// string that holds an encoded JSON object is searched the same way before
/// its raw text is used.
fn server_message(body: &Value) -> Option<String> {
    match body {
        Value::String(text) if !text.trim().is_empty() => {
            match serde_json::from_str::<Value>(text) {
                Ok(inner @ Value::Object(_)) => server_message(&inner).or_else(|| Some(text.clone())),
                _ => Some(text.clone()),
            }
        }
        Value::Object(_) => ["message", "error", "body"]
            .iter()
            .find_map(|key| body.get(key).and_then(server_message)),
        _ => None,
    }
}

/// The record echoed back under `record`, either at the top level or inside
/// `body` (object or JSON-encoded string).
fn echoed_record(body: &Value) -> Option<PunchRecord> {
    let candidate = match body.get("record") {
        Some(record) => record.clone(),
        None => {
            let inner = body.get("body")?;
            let inner = match inner.as_str() {
                Some(text) => serde_json::from_str(text).ok()?,
                None => inner.clone(),
            };
            inner.get("record")?.clone()
        }
    };

    match serde_json::from_value(candidate) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "Echoed record did not parse, ignoring");
            None
        }
    }
}
