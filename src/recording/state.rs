use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recording lifecycle status
///
/// `Idle → Acquiring → Recording → Stopping → Uploading → Completed`, with
/// `Failed` reachable from every non-idle, non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Idle,
    Acquiring,
    Recording,
    Stopping,
    Uploading,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordingStatus::Completed | RecordingStatus::Failed)
    }

    pub fn can_transition_to(self, next: RecordingStatus) -> bool {
        use RecordingStatus::*;

        match (self, next) {
            (Idle, Acquiring)
            | (Acquiring, Recording)
            | (Recording, Stopping)
            | (Stopping, Uploading)
            | (Uploading, Completed) => true,
            (Acquiring | Recording | Stopping | Uploading, Failed) => true,
            (Idle | Acquiring | Recording | Stopping | Uploading | Completed | Failed, _) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordingStatus::Idle => "idle",
            RecordingStatus::Acquiring => "acquiring",
            RecordingStatus::Recording => "recording",
            RecordingStatus::Stopping => "stopping",
            RecordingStatus::Uploading => "uploading",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
        }
    }
}

/// A file produced by the capture provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub filename: String,
    #[serde(default)]
    pub track_type: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub mixed_all_user: bool,
    #[serde(default)]
    pub is_playable: bool,
    #[serde(default)]
    pub slice_start_time: i64,
}

impl ArtifactDescriptor {
    /// Final path component, safe to use as a local file name
    pub fn file_name(&self) -> &str {
        self.filename
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("artifact")
    }
}

/// State of one recording instance for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingState {
    pub session_id: String,
    pub channel: String,
    /// Capture identity the provider records under
    pub capture_uid: String,
    pub status: RecordingStatus,
    /// Provider resource handle from acquire
    pub resource_id: Option<String>,
    /// Provider session handle from start
    pub sid: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub artifacts: Vec<ArtifactDescriptor>,
    /// Shareable link, set only once the upload succeeded
    pub remote_link: Option<String>,
    pub failure: Option<String>,
    pub upload_job: Option<Uuid>,
}

impl RecordingState {
    pub fn new(session_id: String, channel: String, capture_uid: String) -> Self {
        Self {
            session_id,
            channel,
            capture_uid,
            status: RecordingStatus::Idle,
            resource_id: None,
            sid: None,
            started_at: None,
            stopped_at: None,
            artifacts: Vec::new(),
            remote_link: None,
            failure: None,
            upload_job: None,
        }
    }

    /// Move to `next`, rejecting anything off the lifecycle graph
    pub fn transition(&mut self, next: RecordingStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidState(format!(
                "recording for {} cannot move from {} to {}",
                self.session_id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        Ok(())
    }

    /// Settle in `Failed`, keeping the reason
    pub fn fail(&mut self, reason: impl Into<String>) -> EngineResult<()> {
        self.transition(RecordingStatus::Failed)?;
        self.failure = Some(reason.into());
        self.remote_link = None;
        Ok(())
    }
}
