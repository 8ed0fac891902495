// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent rider-facing messages.

use crate::config::ConfigError;
use crate::db::StoreError;
use crate::models::StopId;

/// Application error type shared by the check-in pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No stop selected")]
    NoStopSelected,

    #[error("Unknown stop: {0}")]
    UnknownStop(String),

    #[error("Trip cannot start and end at the same stop ({0})")]
    SameStartEndStop(StopId),

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Submission failed: {0}")]
    SubmissionFailed(SubmissionFailure),

    #[error("Record API error: {0}")]
    FetchFailed(String),

    #[error("State storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Why a start/end submission did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionFailure {
    /// The record store answered but refused the event.
    #[error("rejected by record store: {0}")]
    Rejected(String),

    /// The record store could not be reached or answered garbage.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Coarse error classes used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rider-fixable, no network involved.
    Validation,
    /// Missing or expired session token; routes to re-authentication.
    Auth,
    /// Network or server trouble; retryable by scanning again.
    Transport,
    /// Local storage, configuration or programming errors.
    Internal,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::NoStopSelected | AppError::UnknownStop(_) | AppError::SameStartEndStop(_) => {
                ErrorCategory::Validation
            }
            AppError::NotAuthenticated => ErrorCategory::Auth,
            AppError::SubmissionFailed(_) | AppError::FetchFailed(_) => ErrorCategory::Transport,
            AppError::Storage(_) | AppError::Config(_) | AppError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether the rider can simply scan again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transport)
    }

    /// Short message shown to the rider.
    pub fn rider_message(&self) -> String {
        match self {
            AppError::NoStopSelected => "Select your stop before scanning.".to_string(),
            AppError::UnknownStop(stop) => format!("\"{}\" is not a known stop.", stop),
            AppError::SameStartEndStop(stop) => format!(
                "Your trip started at {}. Scan at a different stop to end it.",
                stop
            ),
            AppError::NotAuthenticated => "Please log in again.".to_string(),
            AppError::SubmissionFailed(SubmissionFailure::Rejected(msg)) => {
                format!("Check-in was not accepted: {}", msg)
            }
            AppError::SubmissionFailed(SubmissionFailure::Transport(_)) => {
                "Check-in failed, please scan again.".to_string()
            }
            AppError::FetchFailed(_) => "Could not load data, please try again.".to_string(),
            AppError::Storage(_) | AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Unexpected error");
                "Something went wrong.".to_string()
            }
        }
    }
}

/// Result type alias for the check-in pipeline
pub type Result<T> = std::result::Result<T, AppError>;
