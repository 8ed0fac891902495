// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Record API client.
//!
//! Handles:
//! - Trip start/end submissions
//! - The advisory "arm" notification when a stop is selected
//! - Fetching a rider's records and the cross-user aggregate
//!
//! Responses are returned raw (status + JSON body). Interpreting them is the
//! job of the submission client, the reconciler and the leaderboard.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::{
    Config, DEFAULT_AGGREGATE_PATH, DEFAULT_END_PATH, DEFAULT_RECORDS_PATH, DEFAULT_START_PATH,
};
use crate::models::StopId;

/// Start-of-trip event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEvent {
    pub user_id: String,
    pub start_stop: StopId,
    /// Token scanned at the stop
    pub uuid: String,
}

/// End-of-trip event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndEvent {
    pub user_id: String,
    pub end_stop: StopId,
    pub uuid: String,
}

/// Body of the advisory arm call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmRequest {
    pub user_id: String,
    pub stop: StopId,
}

/// HTTP status plus decoded body.
///
/// Bodies that are not JSON are kept as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Operations offered by the remote record store.
#[async_trait]
pub trait RecordApi: Send + Sync {
    async fn submit_start(&self, token: &str, event: &StartEvent)
        -> Result<ApiResponse, TransportError>;

    async fn submit_end(&self, token: &str, event: &EndEvent) -> Result<ApiResponse, TransportError>;

    /// Tell the store that scanning is armed at a stop. Advisory.
    async fn arm(&self, token: &str, request: &ArmRequest) -> Result<(), TransportError>;

    async fn fetch_records(&self, token: &str, user_id: &str)
        -> Result<ApiResponse, TransportError>;

    async fn fetch_aggregate(&self, token: &str) -> Result<ApiResponse, TransportError>;
}

/// Endpoint paths relative to the base URL.
#[derive(Debug, Clone)]
pub struct ApiPaths {
    pub start: String,
    pub end: String,
    pub records: String,
    pub aggregate: String,
    pub arm: Option<String>,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_PATH.to_string(),
            end: DEFAULT_END_PATH.to_string(),
            records: DEFAULT_RECORDS_PATH.to_string(),
            aggregate: DEFAULT_AGGREGATE_PATH.to_string(),
            arm: None,
        }
    }
}

/// Record API over HTTPS.
#[derive(Clone)]
pub struct HttpRecordApi {
    http: reqwest::Client,
    base_url: String,
    paths: ApiPaths,
}

impl HttpRecordApi {
    /// Create a client from configuration.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| TransportError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.record_api_base_url.clone(),
            paths: ApiPaths {
                start: config.start_path.clone(),
                end: config.end_path.clone(),
                records: config.records_path.clone(),
                aggregate: config.aggregate_path.clone(),
                arm: config.arm_path.clone(),
            },
        })
    }

    /// Create a client with explicit paths (used by tests).
    pub fn new(base_url: impl Into<String>, paths: ApiPaths) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            paths,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and read the response.
    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<ApiResponse, TransportError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Self::read_response(response).await
    }

    /// Read status and body. Non-JSON bodies are kept as strings.
    async fn read_response(response: reqwest::Response) -> Result<ApiResponse, TransportError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response body: {}", e)))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !(200..300).contains(&status) {
            tracing::debug!(status, "Record API returned non-success status");
        }
        Ok(ApiResponse { status, body })
    }
}

#[async_trait]
impl RecordApi for HttpRecordApi {
    async fn submit_start(
        &self,
        token: &str,
        event: &StartEvent,
    ) -> Result<ApiResponse, TransportError> {
        self.post_json(&self.paths.start, token, event).await
    }

    async fn submit_end(&self, token: &str, event: &EndEvent) -> Result<ApiResponse, TransportError> {
        self.post_json(&self.paths.end, token, event).await
    }

    async fn arm(&self, token: &str, request: &ArmRequest) -> Result<(), TransportError> {
        let Some(path) = self.paths.arm.as_deref() else {
            tracing::debug!(stop = %request.stop, "No arm endpoint configured, skipping");
            return Ok(());
        };

        let response = self.post_json(path, token, request).await?;
        if !response.is_success() {
            return Err(TransportError(format!("HTTP {}", response.status)));
        }
        Ok(())
    }

    async fn fetch_records(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<ApiResponse, TransportError> {
        let response = self
            .http
            .get(self.url(&self.paths.records))
            .bearer_auth(token)
            .query(&[("userId", user_id)])
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Self::read_response(response).await
    }

    async fn fetch_aggregate(&self, token: &str) -> Result<ApiResponse, TransportError> {
        let response = self
            .http
            .get(self.url(&self.paths.aggregate))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Self::read_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bodies_use_wire_names() {
        let start = StartEvent {
            user_id: "rider".to_string(),
            start_stop: StopId::new("Main St"),
            uuid: "tok".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            serde_json::json!({"userId": "rider", "startStop": "Main St", "uuid": "tok"})
        );

        let end = EndEvent {
            user_id: "rider".to_string(),
            end_stop: StopId::new("Harbor"),
            uuid: "tok".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&end).unwrap(),
            serde_json::json!({"userId": "rider", "endStop": "Harbor", "uuid": "tok"})
        );
    }

    #[test]
    fn test_url_joining() {
        let api = HttpRecordApi::new("https://api.example.com/prod/", ApiPaths::default());
        assert_eq!(
            api.url("/setRecordStart"),
            "https://api.example.com/prod/setRecordStart"
        );
        assert_eq!(api.url("getRecord"), "https://api.example.com/prod/getRecord");
    }
}
