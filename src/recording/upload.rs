//! Background artifact upload
//!
//! `stop` persists an `UploadJob` and hands its id to the queue; the worker
//! downloads every artifact, pushes it to object storage and records the
//! outcome on the session. Jobs survive restarts through the store and are
//! re-enqueued by `UploadQueue::recover`.

use super::provider::{CaptureProvider, ObjectStorage};
use super::state::{ArtifactDescriptor, RecordingStatus};
use crate::clock::Clock;
use crate::config::RecordingConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventKind, EventPublisher, SessionEventMessage};
use crate::registry::SessionRegistry;
use crate::session::SessionStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Multipliers of the configured base delay, indexed by failed attempt
const UPLOAD_BACKOFF_STEPS: &[u64] = &[1, 2, 4, 8];

pub fn upload_backoff_ms(base_ms: u64, failed_attempts: u32) -> u64 {
    let idx = (failed_attempts.saturating_sub(1) as usize).min(UPLOAD_BACKOFF_STEPS.len() - 1);
    base_ms.saturating_mul(UPLOAD_BACKOFF_STEPS[idx])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl UploadJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadJobStatus::Completed | UploadJobStatus::Failed)
    }
}

/// Persisted record of one artifact upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: Uuid,
    pub session_id: String,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub status: UploadJobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub remote_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadJob {
    pub fn new(session_id: impl Into<String>, artifacts: Vec<ArtifactDescriptor>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            artifacts,
            status: UploadJobStatus::Pending,
            attempts: 0,
            last_error: None,
            remote_link: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Upload worker settings
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub artifacts_dir: PathBuf,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl UploadSettings {
    pub fn from_config(config: &RecordingConfig) -> Self {
        Self {
            artifacts_dir: config.artifacts_dir.clone(),
            max_attempts: config.upload_max_attempts.max(1),
            backoff_base_ms: config.upload_backoff_ms,
        }
    }
}

/// Everything the worker needs to carry a job to completion
pub struct UploadWorker {
    pub store: Arc<dyn SessionStore>,
    pub provider: Arc<dyn CaptureProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub registry: Arc<SessionRegistry>,
    pub events: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
    pub settings: UploadSettings,
}

/// Handle for submitting upload jobs to the background worker
#[derive(Clone)]
pub struct UploadQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl UploadQueue {
    /// Spawn the worker. It exits once `cancel_token` fires, after finishing
    /// the job in hand.
    pub fn start(worker: UploadWorker, cancel_token: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(worker, rx, cancel_token));
        (Self { tx }, handle)
    }

    pub fn enqueue(&self, job_id: Uuid) -> EngineResult<()> {
        self.tx
            .send(job_id)
            .map_err(|_| EngineError::Storage("upload worker is not running".to_string()))
    }

    /// Re-enqueue every job left unfinished by a previous run
    pub async fn recover(&self, store: &dyn SessionStore) -> EngineResult<usize> {
        let jobs = store.pending_upload_jobs().await?;
        let count = jobs.len();

        for mut job in jobs {
            if job.status == UploadJobStatus::Running {
                job.status = UploadJobStatus::Pending;
                store.save_upload_job(job.clone()).await?;
            }
            self.enqueue(job.id)?;
        }

        if count > 0 {
            info!(count, "Recovered pending upload jobs");
        }
        Ok(count)
    }
}

#[instrument(skip_all, name = "interview.task.upload")]
async fn run_worker(
    worker: UploadWorker,
    mut rx: mpsc::UnboundedReceiver<Uuid>,
    cancel_token: CancellationToken,
) {
    info!("Upload worker started");

    loop {
        tokio::select! {
            next = rx.recv() => {
                match next {
                    Some(job_id) => worker.process(job_id).await,
                    None => break,
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Upload worker received shutdown signal, exiting");
                break;
            }
        }
    }

    info!("Upload worker stopped");
}

impl UploadWorker {
    /// Run one job through its remaining attempts
    pub async fn process(&self, job_id: Uuid) {
        let mut job = match self.store.upload_job(job_id).await {
            Ok(Some(job)) if !job.status.is_terminal() => job,
            Ok(Some(_)) => return,
            Ok(None) => {
                warn!(%job_id, "Upload job not found");
                return;
            }
            Err(e) => {
                error!(%job_id, "Failed to load upload job: {}", e);
                return;
            }
        };

        let max_attempts = self.settings.max_attempts;
        let mut outcome: Result<String> = Err(anyhow::anyhow!("retry budget exhausted"));

        while job.attempts < max_attempts {
            job.attempts += 1;
            job.status = UploadJobStatus::Running;
            job.updated_at = self.clock.now();
            self.save(&job).await;

            info!(session_id = %job.session_id, attempt = job.attempts, "Uploading recording artifacts");
            outcome = self.attempt(&job).await;

            match &outcome {
                Ok(_) => break,
                Err(e) => {
                    warn!(
                        session_id = %job.session_id,
                        attempt = job.attempts,
                        max_attempts,
                        "Upload attempt failed: {:#}",
                        e
                    );
                    job.last_error = Some(format!("{:#}", e));
                    if job.attempts < max_attempts {
                        let delay = upload_backoff_ms(self.settings.backoff_base_ms, job.attempts);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        match outcome {
            Ok(link) => self.finish_completed(job, link).await,
            Err(e) => self.finish_failed(job, format!("{:#}", e)).await,
        }
    }

    /// Download and store every artifact; on error, remove what this attempt stored
    async fn attempt(&self, job: &UploadJob) -> Result<String> {
        let dir = self.local_dir(&job.session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut stored: Vec<String> = Vec::new();
        let result = self.transfer_all(job, &dir, &mut stored).await;

        if result.is_err() {
            for key in &stored {
                if let Err(e) = self.storage.remove(key).await {
                    warn!(session_id = %job.session_id, key = %key, "Failed to remove partial upload: {:#}", e);
                }
            }
        }

        result
    }

    async fn transfer_all(&self, job: &UploadJob, dir: &Path, stored: &mut Vec<String>) -> Result<String> {
        let mut primary: Option<String> = None;
        let mut first: Option<String> = None;

        for artifact in &job.artifacts {
            let local = dir.join(artifact.file_name());
            if tokio::fs::metadata(&local).await.is_err() {
                self.fetch(artifact, &local).await?;
            }

            let key = format!("interviews/{}/{}", job.session_id, artifact.file_name());
            let link = self.storage.upload(&local, &key).await?;
            stored.push(key);

            if primary.is_none() && artifact.file_name().ends_with(".mp4") {
                primary = Some(link.clone());
            }
            first.get_or_insert(link);
        }

        primary
            .or(first)
            .context("recording produced no artifacts to upload")
    }

    /// Download into a `.part` file and move it into place only once complete
    async fn fetch(&self, artifact: &ArtifactDescriptor, local: &Path) -> Result<()> {
        let partial = local.with_file_name(format!("{}.part", artifact.file_name()));

        if let Err(e) = self.provider.fetch_artifact(artifact, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.context(format!("Failed to fetch {}", artifact.filename)));
        }

        tokio::fs::rename(&partial, local)
            .await
            .with_context(|| format!("Failed to move {} into place", local.display()))
    }

    async fn finish_completed(&self, mut job: UploadJob, link: String) {
        let now = self.clock.now();
        job.status = UploadJobStatus::Completed;
        job.remote_link = Some(link.clone());
        job.last_error = None;
        job.updated_at = now;
        self.save(&job).await;

        let recorded = link.clone();
        let result = self
            .store
            .modify(
                &job.session_id,
                Box::new(move |s| {
                    let recording = s.recording.as_mut().ok_or_else(|| {
                        EngineError::InvalidState("session has no recording".to_string())
                    })?;
                    recording.transition(RecordingStatus::Completed)?;
                    recording.remote_link = Some(recorded);
                    recording.failure = None;
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await;

        self.registry.remove_recording(&job.session_id).await;

        match result {
            Ok(_) => {
                info!(session_id = %job.session_id, link = %link, "Recording upload completed");
                self.remove_local(&job.session_id).await;
                self.announce(
                    SessionEventMessage::new(EventKind::RecordingCompleted, &job.session_id, now)
                        .with_detail(serde_json::json!({ "link": link })),
                )
                .await;
            }
            Err(e) => {
                // Artifacts stay on disk until the record shows completion
                error!(session_id = %job.session_id, "Failed to record completed upload: {}", e);
            }
        }
    }

    async fn finish_failed(&self, mut job: UploadJob, reason: String) {
        let now = self.clock.now();
        job.status = UploadJobStatus::Failed;
        job.last_error = Some(reason.clone());
        job.remote_link = None;
        job.updated_at = now;
        self.save(&job).await;

        let recorded = reason.clone();
        let result = self
            .store
            .modify(
                &job.session_id,
                Box::new(move |s| {
                    let recording = s.recording.as_mut().ok_or_else(|| {
                        EngineError::InvalidState("session has no recording".to_string())
                    })?;
                    recording.fail(recorded)?;
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await;

        self.registry.remove_recording(&job.session_id).await;

        if let Err(e) = result {
            error!(session_id = %job.session_id, "Failed to record failed upload: {}", e);
        }

        error!(
            session_id = %job.session_id,
            attempts = job.attempts,
            "Recording upload failed, artifacts kept in {}: {}",
            self.local_dir(&job.session_id).display(),
            reason
        );
        self.announce(
            SessionEventMessage::new(EventKind::RecordingFailed, &job.session_id, now)
                .with_detail(serde_json::json!({ "reason": reason })),
        )
        .await;
    }

    fn local_dir(&self, session_id: &str) -> PathBuf {
        self.settings.artifacts_dir.join(session_id)
    }

    async fn remove_local(&self, session_id: &str) {
        let dir = self.local_dir(session_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(session_id = %session_id, "Failed to remove {}: {}", dir.display(), e),
        }
    }

    async fn save(&self, job: &UploadJob) {
        if let Err(e) = self.store.save_upload_job(job.clone()).await {
            error!(job_id = %job.id, "Failed to persist upload job: {}", e);
        }
    }

    async fn announce(&self, event: SessionEventMessage) {
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish recording event: {:#}", e);
        }
    }
}
