use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Booked,
    Confirmed,
    RescheduleRequested,
    Rescheduled,
    Cancelled,
    NoShow,
    Started,
    Completed,
    Reminder,
    ConversationCompleted,
    RecordingStarted,
    RecordingStopped,
    RecordingCompleted,
    RecordingFailed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Booked => "booked",
            EventKind::Confirmed => "confirmed",
            EventKind::RescheduleRequested => "reschedule_requested",
            EventKind::Rescheduled => "rescheduled",
            EventKind::Cancelled => "cancelled",
            EventKind::NoShow => "no_show",
            EventKind::Started => "started",
            EventKind::Completed => "completed",
            EventKind::Reminder => "reminder",
            EventKind::ConversationCompleted => "conversation_completed",
            EventKind::RecordingStarted => "recording_started",
            EventKind::RecordingStopped => "recording_stopped",
            EventKind::RecordingCompleted => "recording_completed",
            EventKind::RecordingFailed => "recording_failed",
        }
    }
}

/// Lifecycle event published for one interview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEventMessage {
    pub kind: EventKind,
    pub session_id: String,
    /// Session status after the transition, when it changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub detail: serde_json::Value,
}

impl SessionEventMessage {
    pub fn new(kind: EventKind, session_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            status: None,
            timestamp,
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn subject(&self) -> String {
        format!("interview.{}.{}", self.kind.as_str(), self.session_id)
    }
}
