//! Join-link validation
//!
//! Pure check of a (session, token, participant) triple against the session's
//! temporal window. Nothing here mutates state; callers decide what to do with
//! the verdict.

use crate::clock::TimeWindow;
use crate::config::AccessConfig;
use crate::error::EngineError;
use crate::session::{InterviewSession, SessionStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;

/// Successful join validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    pub session_id: String,
    pub status: SessionStatus,
    pub starts_at: DateTime<Utc>,
    /// Last instant a join is accepted (slot end plus grace)
    pub closes_at: DateTime<Utc>,
    /// True anywhere inside the join window, early access included
    pub can_start: bool,
    /// True once the scheduled start has passed
    pub started: bool,
    /// Seconds until `closes_at`, never negative
    pub time_remaining_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    NotFound,
    Cancelled,
    AlreadyCompleted,
    NotStarted {
        starts_at: DateTime<Utc>,
        can_join_at: DateTime<Utc>,
    },
    Expired,
}

pub type AccessVerdict = Result<AccessGrant, AccessDenied>;

impl From<AccessDenied> for EngineError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::NotFound => {
                EngineError::NotFound("Invalid interview link or access token".to_string())
            }
            AccessDenied::Cancelled => EngineError::Cancelled,
            AccessDenied::AlreadyCompleted => EngineError::AlreadyCompleted,
            AccessDenied::NotStarted {
                starts_at,
                can_join_at,
            } => EngineError::NotStarted {
                starts_at,
                can_join_at,
            },
            AccessDenied::Expired => EngineError::Expired,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    early_access: Duration,
    grace: Duration,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::from_config(&AccessConfig::default())
    }
}

impl AccessPolicy {
    pub fn new(early_access: Duration, grace: Duration) -> Self {
        Self {
            early_access,
            grace,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(
            Duration::minutes(i64::from(config.early_access_minutes)),
            Duration::minutes(i64::from(config.grace_minutes)),
        )
    }

    /// `[start - early_access, start + duration + grace]`, both ends inclusive
    pub fn join_window(&self, session: &InterviewSession) -> TimeWindow {
        session.window().widen(self.early_access, self.grace)
    }

    /// Validate a join attempt. `session` is the record looked up by id, if any.
    pub fn validate(
        &self,
        session: Option<&InterviewSession>,
        token: &str,
        participant_id: &str,
        now: DateTime<Utc>,
    ) -> AccessVerdict {
        let session = session.ok_or(AccessDenied::NotFound)?;

        let token_matches: bool = session.token.as_bytes().ct_eq(token.as_bytes()).into();
        if !token_matches || session.candidate.id != participant_id {
            return Err(AccessDenied::NotFound);
        }

        match session.status {
            SessionStatus::Cancelled => return Err(AccessDenied::Cancelled),
            SessionStatus::Completed => return Err(AccessDenied::AlreadyCompleted),
            _ => {}
        }

        let window = self.join_window(session);
        if now < window.start {
            return Err(AccessDenied::NotStarted {
                starts_at: session.slot.starts_at,
                can_join_at: window.start,
            });
        }
        if now > window.end {
            return Err(AccessDenied::Expired);
        }

        Ok(AccessGrant {
            session_id: session.id.clone(),
            status: session.status,
            starts_at: session.slot.starts_at,
            closes_at: window.end,
            can_start: window.contains_inclusive(now),
            started: now >= session.slot.starts_at,
            time_remaining_secs: (window.end - now).num_seconds().max(0),
        })
    }
}
