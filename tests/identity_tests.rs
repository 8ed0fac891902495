// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity extraction from tokens shaped like the identity provider's.

mod common;

use chrono::Duration;
use std::sync::Arc;

use common::{mint_token, test_epoch};
use stop_checkin::db::{MemoryStateStore, StateStore};
use stop_checkin::identity::decode_identity;
use stop_checkin::models::{StopId, TripState};
use stop_checkin::session::Session;
use stop_checkin::time_utils::{Clock, ManualClock};

#[test]
fn test_signed_token_decodes() {
    let exp = test_epoch() + Duration::hours(1);
    let identity = decode_identity(&mint_token("c0ffee-rider", exp)).expect("token should decode");

    assert_eq!(identity.user_id, "c0ffee-rider");
    assert_eq!(identity.email.as_deref(), Some("c0ffee-rider@example.com"));
    assert_eq!(identity.expires_at, Some(exp));
    assert!(!identity.is_expired(test_epoch()));
    assert!(identity.is_expired(exp));
}

#[test]
fn test_tampered_token_fails_closed() {
    let token = mint_token("rider", test_epoch() + Duration::hours(1));
    let mut parts: Vec<&str> = token.split('.').collect();
    parts[1] = "%%%";

    assert!(decode_identity(&parts.join(".")).is_none());
}

#[test]
fn test_relogin_same_rider_keeps_trip() {
    let exp = test_epoch() + Duration::hours(1);
    let store = Arc::new(MemoryStateStore::with_token(&mint_token("rider", exp)));
    store
        .save_trip_state(&TripState::active(StopId::new("Main St"), 5))
        .unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(test_epoch()));

    let fresh = mint_token("rider", exp + Duration::hours(1));
    let session = Session::login(&fresh, store.clone(), clock).unwrap();

    assert_eq!(
        session.trip_state(),
        TripState::active(StopId::new("Main St"), 5)
    );
    assert_eq!(store.load_token().unwrap().as_deref(), Some(fresh.as_str()));
}

#[test]
fn test_login_rejects_garbage() {
    let store = Arc::new(MemoryStateStore::default());
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(test_epoch()));

    assert!(Session::login("not-a-token", store.clone(), clock).is_err());
    assert_eq!(store.load_token().unwrap(), None);
}
