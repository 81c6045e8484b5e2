use super::provider::CaptureProvider;
use super::state::{ArtifactDescriptor, RecordingState, RecordingStatus};
use super::upload::{UploadJob, UploadJobStatus, UploadQueue};
use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventKind, EventPublisher, SessionEventMessage};
use crate::registry::{SessionRegistry, SharedRecording};
use crate::session::{ids, InterviewSession, SessionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Control acknowledgement for start/stop
///
/// `status` is `None` for demo sessions, which never touch the provider.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingAck {
    pub session_id: String,
    pub status: Option<RecordingStatus>,
    pub demo: bool,
    pub message: String,
}

/// Point-in-time view of a session's recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordingView {
    pub session_id: String,
    pub demo: bool,
    pub status: Option<RecordingStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub remote_link: Option<String>,
    pub failure: Option<String>,
}

impl RecordingView {
    fn from_state(session: &InterviewSession, state: Option<&RecordingState>) -> Self {
        Self {
            session_id: session.id.clone(),
            demo: session.demo,
            status: state.map(|s| s.status),
            started_at: state.and_then(|s| s.started_at),
            stopped_at: state.and_then(|s| s.stopped_at),
            artifacts: state.map(|s| s.artifacts.clone()).unwrap_or_default(),
            remote_link: state.and_then(|s| s.remote_link.clone()),
            failure: state.and_then(|s| s.failure.clone()),
        }
    }
}

/// Drives acquire → record → stop and hands finished captures to the upload queue
pub struct RecordingManager {
    provider: Arc<dyn CaptureProvider>,
    store: Arc<dyn SessionStore>,
    registry: Arc<SessionRegistry>,
    uploads: UploadQueue,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl RecordingManager {
    pub fn new(
        provider: Arc<dyn CaptureProvider>,
        store: Arc<dyn SessionStore>,
        registry: Arc<SessionRegistry>,
        uploads: UploadQueue,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            uploads,
            events,
            clock,
        }
    }

    async fn session(&self, session_id: &str) -> EngineResult<InterviewSession> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Interview {} not found", session_id)))
    }

    fn demo_ack(session_id: &str, action: &str) -> RecordingAck {
        info!(session_id = %session_id, "Demo session, skipping recording {}", action);
        RecordingAck {
            session_id: session_id.to_string(),
            status: None,
            demo: true,
            message: format!("Demo session: recording {} skipped", action),
        }
    }

    pub async fn start(&self, session_id: &str) -> EngineResult<RecordingAck> {
        let session = self.session(session_id).await?;
        if session.demo {
            return Ok(Self::demo_ack(session_id, "start"));
        }

        if !session.is_blocking() {
            return Err(EngineError::InvalidState(format!(
                "cannot record interview {} while {}",
                session_id,
                session.status.as_str()
            )));
        }

        if let Some(previous) = &session.recording {
            if previous.status != RecordingStatus::Failed {
                return Err(EngineError::InvalidState(format!(
                    "interview {} already has a {} recording",
                    session_id,
                    previous.status.as_str()
                )));
            }
        }

        let now = self.clock.now();
        let state = RecordingState::new(
            session.id.clone(),
            session.channel.clone(),
            ids::recorder_uid(now),
        );
        let shared = self.registry.insert_recording(state, now).await?;
        let mut state = shared.lock().await;

        state.transition(RecordingStatus::Acquiring)?;
        let acquired = self.provider.acquire(&state.channel, &state.capture_uid).await;
        let resource_id = match acquired {
            Ok(resource_id) => resource_id,
            Err(e) => return Err(self.abort(&mut state, "acquire", e).await),
        };
        state.resource_id = Some(resource_id.clone());

        let credential = ids::capture_credential();
        let started = self
            .provider
            .start(&resource_id, &state.channel, &state.capture_uid, &credential)
            .await;
        let sid = match started {
            Ok(sid) => sid,
            Err(e) => return Err(self.abort(&mut state, "start", e).await),
        };

        state.transition(RecordingStatus::Recording)?;
        state.sid = Some(sid);
        state.started_at = Some(self.clock.now());
        self.persist(&state).await?;

        info!(session_id = %session_id, channel = %state.channel, "Recording started");
        self.announce(EventKind::RecordingStarted, session_id).await;

        Ok(RecordingAck {
            session_id: session_id.to_string(),
            status: Some(state.status),
            demo: false,
            message: "Recording started".to_string(),
        })
    }

    /// Stop capture and schedule the upload; does not wait for it
    pub async fn stop(&self, session_id: &str) -> EngineResult<RecordingAck> {
        let session = self.session(session_id).await?;
        if session.demo {
            return Ok(Self::demo_ack(session_id, "stop"));
        }

        let now = self.clock.now();
        let shared = self.live_recording(&session, now).await?;
        let mut state = shared.lock().await;

        state.transition(RecordingStatus::Stopping)?;

        let (resource_id, sid) = match (state.resource_id.clone(), state.sid.clone()) {
            (Some(resource_id), Some(sid)) => (resource_id, sid),
            _ => {
                let e = anyhow::anyhow!("recording has no provider handles");
                return Err(self.abort(&mut state, "stop", e).await);
            }
        };

        let stopped = self
            .provider
            .stop(&resource_id, &sid, &state.channel, &state.capture_uid)
            .await;
        let artifacts = match stopped {
            Ok(artifacts) => artifacts,
            Err(e) => return Err(self.abort(&mut state, "stop", e).await),
        };
        state.stopped_at = Some(self.clock.now());

        if artifacts.is_empty() {
            let e = anyhow::anyhow!("provider returned no artifacts");
            return Err(self.abort(&mut state, "stop", e).await);
        }

        state.transition(RecordingStatus::Uploading)?;
        state.artifacts = artifacts.clone();

        let job = UploadJob::new(session_id, artifacts, now);
        let job_id = job.id;
        state.upload_job = Some(job_id);

        if let Err(e) = self.hand_off(&state, job).await {
            let cause = anyhow::anyhow!("{}", e);
            self.abort(&mut state, "upload hand-off", cause).await;
            return Err(e);
        }

        info!(
            session_id = %session_id,
            artifacts = state.artifacts.len(),
            %job_id,
            "Recording stopped, upload queued"
        );
        self.announce(EventKind::RecordingStopped, session_id).await;

        Ok(RecordingAck {
            session_id: session_id.to_string(),
            status: Some(state.status),
            demo: false,
            message: "Recording stopped, upload in progress".to_string(),
        })
    }

    /// The registry entry, or one rebuilt from a durable `Recording` state
    /// whose live entry was lost to a restart or the idle sweep
    async fn live_recording(
        &self,
        session: &InterviewSession,
        now: DateTime<Utc>,
    ) -> EngineResult<SharedRecording> {
        if let Some(shared) = self.registry.recording(&session.id, now).await {
            return Ok(shared);
        }

        match &session.recording {
            Some(durable) if durable.status == RecordingStatus::Recording => {
                warn!(session_id = %session.id, "Resuming recording from the durable record");
                self.registry.insert_recording(durable.clone(), now).await
            }
            _ => Err(EngineError::InvalidState(format!(
                "No active recording for interview {}",
                session.id
            ))),
        }
    }

    /// Persist the job and the uploading state, then queue the job.
    /// A job that cannot be queued is marked failed so recovery skips it.
    async fn hand_off(&self, state: &RecordingState, job: UploadJob) -> EngineResult<()> {
        let mut queued_job = job.clone();
        self.store.save_upload_job(job).await?;

        let queued = self
            .persist(state)
            .await
            .and_then(|()| self.uploads.enqueue(queued_job.id));

        if let Err(e) = queued {
            queued_job.status = UploadJobStatus::Failed;
            queued_job.last_error = Some(e.to_string());
            queued_job.updated_at = self.clock.now();
            if let Err(save) = self.store.save_upload_job(queued_job).await {
                warn!(session_id = %state.session_id, "Failed to mark upload job failed: {}", save);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Live state if the registry holds it, otherwise the durable copy
    pub async fn status(&self, session_id: &str) -> EngineResult<RecordingView> {
        let session = self.session(session_id).await?;

        if let Some(shared) = self.registry.recording(session_id, self.clock.now()).await {
            let state = shared.lock().await;
            return Ok(RecordingView::from_state(&session, Some(&*state)));
        }

        Ok(RecordingView::from_state(&session, session.recording.as_ref()))
    }

    /// Settle in `Failed`, drop provider handles and the live entry
    async fn abort(&self, state: &mut RecordingState, step: &str, cause: anyhow::Error) -> EngineError {
        let reason = format!("{} failed: {:#}", step, cause);
        error!(session_id = %state.session_id, "Recording {}", reason);

        if let Err(e) = state.fail(reason.clone()) {
            warn!(session_id = %state.session_id, "{}", e);
        }
        state.resource_id = None;
        state.sid = None;

        self.registry.remove_recording(&state.session_id).await;
        if let Err(e) = self.persist(state).await {
            error!(session_id = %state.session_id, "Failed to persist failed recording: {}", e);
        }
        self.announce(EventKind::RecordingFailed, &state.session_id).await;

        EngineError::UpstreamFailure(reason)
    }

    async fn persist(&self, state: &RecordingState) -> EngineResult<()> {
        let snapshot = state.clone();
        let now = self.clock.now();
        self.store
            .modify(
                &state.session_id,
                Box::new(move |s| {
                    s.recording = Some(snapshot);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await
            .map(|_| ())
    }

    async fn announce(&self, kind: EventKind, session_id: &str) {
        let event = SessionEventMessage::new(kind, session_id, self.clock.now());
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish recording event: {:#}", e);
        }
    }
}
