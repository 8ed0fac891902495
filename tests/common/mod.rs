// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use stop_checkin::config::Config;
use stop_checkin::db::{MemoryStateStore, StateStore};
use stop_checkin::services::record_api::{ArmRequest, EndEvent, StartEvent};
use stop_checkin::services::{ApiResponse, RecordApi, TransportError};
use stop_checkin::session::Session;
use stop_checkin::time_utils::{Clock, ManualClock};
use stop_checkin::AppState;

/// Fixed wall-clock start for every test.
#[allow(dead_code)]
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap()
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    exp: i64,
    email: String,
}

/// Mint an HS256 ID token for `sub` expiring at `exp`.
#[allow(dead_code)]
pub fn mint_token(sub: &str, exp: DateTime<Utc>) -> String {
    let claims = TestClaims {
        sub,
        exp: exp.timestamp(),
        email: format!("{}@example.com", sub),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("Failed to mint token")
}

/// A call the fake record API received.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Call {
    Start(StartEvent),
    End(EndEvent),
    Arm(ArmRequest),
    Records(String),
    Aggregate,
}

/// Scripted answer for one endpoint.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Reply {
    Respond(ApiResponse),
    Fail(String),
}

impl Reply {
    #[allow(dead_code)]
    pub fn ok(body: Value) -> Self {
        Reply::Respond(ApiResponse::new(200, body))
    }

    #[allow(dead_code)]
    pub fn status(status: u16, body: Value) -> Self {
        Reply::Respond(ApiResponse::new(status, body))
    }

    #[allow(dead_code)]
    fn into_result(self) -> Result<ApiResponse, TransportError> {
        match self {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(cause) => Err(TransportError(cause)),
        }
    }
}

/// In-memory record API that records every call.
///
/// Submissions can be held on a gate so tests can act while one is in flight.
#[allow(dead_code)]
pub struct FakeRecordApi {
    calls: Mutex<Vec<Call>>,
    start: Mutex<Reply>,
    end: Mutex<Reply>,
    records: Mutex<Reply>,
    aggregate: Mutex<Reply>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for FakeRecordApi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            start: Mutex::new(Reply::ok(json!({"statusCode": 200}))),
            end: Mutex::new(Reply::ok(json!({"statusCode": 200}))),
            records: Mutex::new(Reply::ok(json!([]))),
            aggregate: Mutex::new(Reply::ok(json!({}))),
            gate: Mutex::new(None),
        }
    }
}

#[allow(dead_code)]
impl FakeRecordApi {
    pub fn set_start(&self, reply: Reply) {
        *self.start.lock().unwrap() = reply;
    }

    pub fn set_end(&self, reply: Reply) {
        *self.end.lock().unwrap() = reply;
    }

    pub fn set_records(&self, reply: Reply) {
        *self.records.lock().unwrap() = reply;
    }

    pub fn set_aggregate(&self, reply: Reply) {
        *self.aggregate.lock().unwrap() = reply;
    }

    /// Hold start/end submissions until the returned gate is notified.
    pub fn hold_submissions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Start(_) | Call::End(_)))
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_for_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl RecordApi for FakeRecordApi {
    async fn submit_start(
        &self,
        _token: &str,
        event: &StartEvent,
    ) -> Result<ApiResponse, TransportError> {
        self.record(Call::Start(event.clone()));
        self.wait_for_gate().await;
        let reply = self.start.lock().unwrap().clone();
        reply.into_result()
    }

    async fn submit_end(&self, _token: &str, event: &EndEvent) -> Result<ApiResponse, TransportError> {
        self.record(Call::End(event.clone()));
        self.wait_for_gate().await;
        let reply = self.end.lock().unwrap().clone();
        reply.into_result()
    }

    async fn arm(&self, _token: &str, request: &ArmRequest) -> Result<(), TransportError> {
        self.record(Call::Arm(request.clone()));
        Ok(())
    }

    async fn fetch_records(
        &self,
        _token: &str,
        user_id: &str,
    ) -> Result<ApiResponse, TransportError> {
        self.record(Call::Records(user_id.to_string()));
        let reply = self.records.lock().unwrap().clone();
        reply.into_result()
    }

    async fn fetch_aggregate(&self, _token: &str) -> Result<ApiResponse, TransportError> {
        self.record(Call::Aggregate);
        let reply = self.aggregate.lock().unwrap().clone();
        reply.into_result()
    }
}

/// A logged-in rider wired to the fake API.
#[allow(dead_code)]
pub struct Harness {
    pub api: Arc<FakeRecordApi>,
    pub store: Arc<MemoryStateStore>,
    pub clock: Arc<ManualClock>,
    pub app: AppState,
}

/// Build a harness for rider `sub` with the test config.
#[allow(dead_code)]
pub fn harness(sub: &str) -> Harness {
    harness_with_config(sub, &Config::test_default())
}

#[allow(dead_code)]
pub fn harness_with_config(sub: &str, config: &Config) -> Harness {
    let api = Arc::new(FakeRecordApi::default());
    let store = Arc::new(MemoryStateStore::default());
    let clock = Arc::new(ManualClock::new(test_epoch()));

    let token = mint_token(sub, test_epoch() + Duration::days(1));
    let dyn_store: Arc<dyn StateStore> = store.clone();
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let session = Session::login(&token, dyn_store, dyn_clock).expect("login should succeed");

    let dyn_api: Arc<dyn RecordApi> = api.clone();
    let app = AppState::for_session(config, dyn_api, Arc::new(session));

    Harness {
        api,
        store,
        clock,
        app,
    }
}

/// Let spawned background tasks run.
#[allow(dead_code)]
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
