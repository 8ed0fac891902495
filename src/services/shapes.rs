// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Envelope shape matchers for record API payloads.
//!
//! The record API does not answer in one consistent shape. Each accepted
//! shape is a matcher here; callers try them in the listed order and take
//! the first that matches.

use serde_json::{Map, Value};

/// How many `body` wrappers are peeled at most.
pub const MAX_ENVELOPE_DEPTH: usize = 2;

/// Envelope fields that are never user ids in the aggregate.
pub const RESERVED_KEYS: &[&str] = &["body", "message", "statusCode"];

/// Accepted shapes of a record list payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// `[ {...}, ... ]`
    PlainArray,
    /// `"[ {...}, ... ]"`, parsed once
    EncodedString,
    /// `{ "body": ... }` with the list (or `{ "records": [...] }`) at most
    /// two `body` levels down; a level may be a JSON-encoded string
    BodyWrapper,
}

impl RecordShape {
    pub const ORDER: [RecordShape; 3] = [
        RecordShape::PlainArray,
        RecordShape::EncodedString,
        RecordShape::BodyWrapper,
    ];

    pub fn extract(self, value: &Value) -> Option<Vec<Value>> {
        match self {
            RecordShape::PlainArray => value.as_array().cloned(),
            RecordShape::EncodedString => {
                let parsed = parse_encoded(value)?;
                sequence_in(&parsed)
            }
            RecordShape::BodyWrapper => {
                let mut current = value.clone();
                for _ in 0..MAX_ENVELOPE_DEPTH {
                    let body = current.get("body")?;
                    let body = parse_encoded(body).unwrap_or_else(|| body.clone());
                    if let Some(records) = sequence_in(&body) {
                        return Some(records);
                    }
                    current = body;
                }
                None
            }
        }
    }
}

/// Find the record list in `value`, trying each shape in order.
pub fn match_records(value: &Value) -> Option<(RecordShape, Vec<Value>)> {
    RecordShape::ORDER
        .into_iter()
        .find_map(|shape| shape.extract(value).map(|records| (shape, records)))
}

/// Accepted shapes of the aggregate (user → count) payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateShape {
    /// `{ "body": "<json object>" }`; the parsed object may itself hold the
    /// map under `body`
    EncodedBody,
    /// `{ "body": { ... } }`, optionally `{ "body": { "body": { ... } } }`
    ObjectBody,
    /// The top-level object is the map
    TopLevel,
}

impl AggregateShape {
    pub const ORDER: [AggregateShape; 3] = [
        AggregateShape::EncodedBody,
        AggregateShape::ObjectBody,
        AggregateShape::TopLevel,
    ];

    pub fn extract(self, value: &Value) -> Option<Map<String, Value>> {
        match self {
            AggregateShape::EncodedBody => {
                let body = value.get("body").filter(|b| b.is_string())?;
                let parsed = parse_encoded(body)?;
                let parsed = parsed.as_object()?;
                Some(inner_object(parsed).unwrap_or(parsed).clone())
            }
            AggregateShape::ObjectBody => {
                let body = value.get("body")?.as_object()?;
                Some(inner_object(body).unwrap_or(body).clone())
            }
            AggregateShape::TopLevel => value.as_object().cloned(),
        }
    }
}

/// Find the user → count map in `value`, trying each shape in order.
pub fn match_aggregate(value: &Value) -> Option<(AggregateShape, Map<String, Value>)> {
    AggregateShape::ORDER
        .into_iter()
        .find_map(|shape| shape.extract(value).map(|map| (shape, map)))
}

/// A list, or an object carrying the list under `records`.
fn sequence_in(value: &Value) -> Option<Vec<Value>> {
    value
        .as_array()
        .or_else(|| value.get("records").and_then(Value::as_array))
        .cloned()
}

fn inner_object(object: &Map<String, Value>) -> Option<&Map<String, Value>> {
    object.get("body").and_then(Value::as_object)
}

fn parse_encoded(value: &Value) -> Option<Value> {
    serde_json::from_str(value.as_str()?).ok()
}
