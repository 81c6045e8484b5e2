use crate::clock::TimeWindow;
use crate::conversation::AnswerRecord;
use crate::error::{EngineError, EngineResult};
use crate::recording::RecordingState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable interview status
///
/// Transitions follow a fixed graph; `Completed`, `Cancelled` and `NoShow`
/// are terminal. The only way back from a confirmed slot to an earlier
/// state is through `Rescheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl SessionStatus {
    pub const BLOCKING: [SessionStatus; 4] = [
        SessionStatus::Scheduled,
        SessionStatus::Confirmed,
        SessionStatus::Rescheduled,
        SessionStatus::InProgress,
    ];

    /// Whether a session in this status holds its slot against the interviewer
    pub fn is_blocking(self) -> bool {
        Self::BLOCKING.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::NoShow
        )
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        match (self, next) {
            (Scheduled, Confirmed | InProgress | Cancelled | NoShow | Rescheduled) => true,
            (Confirmed, InProgress | Cancelled | NoShow | Rescheduled) => true,
            (Rescheduled, Confirmed | InProgress | Cancelled | NoShow | Rescheduled) => true,
            (InProgress, Completed | Cancelled) => true,
            (Scheduled | Confirmed | Rescheduled | InProgress | Completed | Cancelled | NoShow, _) => {
                false
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no_show",
            SessionStatus::Rescheduled => "rescheduled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    Declined,
    Rescheduled,
}

/// Booked slot of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub interviewer_type: String,
}

impl ScheduledSlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::starting_at(self.starts_at, self.duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleState {
    Pending,
    Approved,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub requested_start: DateTime<Utc>,
    pub reason: String,
    pub status: RescheduleState,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Scheduled,
    Confirmation,
    Reschedule,
    Cancellation,
    Reminder,
    NoShow,
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationChannel {
    Email,
    Sms,
    InApp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub kind: NotificationKind,
    pub channel: NotificationChannel,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// The durable record of one interview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: String,
    /// Secret that must accompany every join request
    pub token: String,
    pub candidate: CandidateProfile,
    pub job_id: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub application_id: Option<String>,
    pub slot: ScheduledSlot,
    pub link: String,
    pub channel: String,
    pub status: SessionStatus,
    pub confirmation: ConfirmationStatus,
    #[serde(default)]
    pub reschedule_requests: Vec<RescheduleRequest>,
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
    #[serde(default)]
    pub reminder_sent: bool,
    /// Demo sessions skip the capture provider entirely
    #[serde(default)]
    pub demo: bool,
    #[serde(default)]
    pub recording: Option<RecordingState>,
    /// Completed answer log, written once the conversation finishes
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn window(&self) -> TimeWindow {
        self.slot.window()
    }

    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }

    /// Move along the status graph or fail without touching the record
    pub fn transition(&mut self, next: SessionStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidState(format!(
                "interview {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        Ok(())
    }

    pub fn notify(&mut self, kind: NotificationKind, at: DateTime<Utc>) {
        self.notifications.push(NotificationRecord {
            kind,
            channel: NotificationChannel::InApp,
            sent_at: at,
        });
    }

    pub fn pending_reschedule(&mut self) -> Option<&mut RescheduleRequest> {
        self.reschedule_requests
            .iter_mut()
            .find(|r| r.status == RescheduleState::Pending)
    }
}
