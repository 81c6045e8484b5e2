//! Engine error taxonomy.
//!
//! Every engine returns `EngineError`; the HTTP layer turns it into a status
//! code plus a structured body carrying whatever the caller needs to
//! self-correct (conflicting intervals, earliest join time).

use crate::clock::TimeWindow;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        conflicts: Vec<TimeWindow>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Interview has not started yet (join opens at {can_join_at})")]
    NotStarted {
        starts_at: DateTime<Utc>,
        can_join_at: DateTime<Utc>,
    },

    #[error("Interview session has expired")]
    Expired,

    #[error("Interview has been cancelled")]
    Cancelled,

    #[error("Interview has already been completed")]
    AlreadyCompleted,

    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn conflict(message: impl Into<String>, conflicts: Vec<TimeWindow>) -> Self {
        EngineError::Conflict {
            message: message.into(),
            conflicts,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict { .. } | EngineError::InvalidState(_) => StatusCode::CONFLICT,
            // 425 Too Early
            EngineError::NotStarted { .. } => {
                StatusCode::from_u16(425).unwrap_or(StatusCode::FORBIDDEN)
            }
            EngineError::Expired | EngineError::Cancelled | EngineError::AlreadyCompleted => {
                StatusCode::GONE
            }
            EngineError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Conflict { .. } => "CONFLICT",
            EngineError::InvalidState(_) => "INVALID_STATE",
            EngineError::NotStarted { .. } => "NOT_STARTED",
            EngineError::Expired => "EXPIRED",
            EngineError::Cancelled => "CANCELLED",
            EngineError::AlreadyCompleted => "ALREADY_COMPLETED",
            EngineError::UpstreamFailure(_) => "UPSTREAM_FAILURE",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicts: Option<Vec<TimeWindow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    can_join_at: Option<DateTime<Utc>>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            EngineError::Storage(err) => {
                tracing::error!(target: "interview.storage", error = %err, "Storage operation failed");
                "An internal storage error occurred".to_string()
            }
            EngineError::UpstreamFailure(err) => {
                tracing::warn!(target: "interview.upstream", error = %err, "Upstream provider failed");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let mut detail = ErrorDetail {
            code: self.code(),
            message,
            conflicts: None,
            starts_at: None,
            can_join_at: None,
        };

        match self {
            EngineError::Conflict { conflicts, .. } => detail.conflicts = Some(conflicts),
            EngineError::NotStarted {
                starts_at,
                can_join_at,
            } => {
                detail.starts_at = Some(starts_at);
                detail.can_join_at = Some(can_join_at);
            }
            _ => {}
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}
