#![allow(dead_code)]

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use interview_orchestrator::{
    config::Config,
    recording::{RecordingView, UploadSettings},
    ArtifactDescriptor, BookingRequest, CandidateProfile, CaptureProvider, Clock,
    ConversationService, EventKind, EventPublisher, FixedClock, InterviewSession, LocalStore,
    ObjectStorage, Question, RecordingManager, SessionEventMessage, SessionRegistry,
    SessionService, SessionStore, StaticQuestionSource, UploadJob, UploadQueue, UploadWorker,
};
use interview_orchestrator::{
    session::{SessionQuery, SessionUpdate},
    EngineError, EngineResult,
};
use uuid::Uuid;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Monday 2026-03-02 08:00 UTC
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn at(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

pub fn candidate(id: &str) -> CandidateProfile {
    CandidateProfile {
        id: id.to_string(),
        name: format!("Candidate {}", id),
        email: format!("{}@example.com", id),
    }
}

pub fn booking(candidate_id: &str, job_id: &str, date: &str, time: &str) -> BookingRequest {
    BookingRequest {
        candidate: candidate(candidate_id),
        job_id: job_id.to_string(),
        job_title: "Backend Engineer".to_string(),
        application_id: None,
        date: date.to_string(),
        time: time.to_string(),
        demo: false,
    }
}

pub fn questions(n: u32) -> Vec<Question> {
    (1..=n)
        .map(|i| Question::new(i, format!("Question number {}?", i)))
        .collect()
}

/// Captures published events for assertions
#[derive(Default)]
pub struct CollectingPublisher {
    events: Mutex<Vec<SessionEventMessage>>,
}

impl CollectingPublisher {
    pub fn kinds_for(&self, session_id: &str) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id == session_id)
            .map(|e| e.kind)
            .collect()
    }
}

#[async_trait::async_trait]
impl EventPublisher for CollectingPublisher {
    async fn publish(&self, event: SessionEventMessage) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Scriptable capture provider
#[derive(Default)]
pub struct MockCapture {
    pub fail_acquire: AtomicBool,
    pub fail_start: AtomicBool,
    pub empty_stop: AtomicBool,
    /// Number of upcoming `fetch_artifact` calls that fail
    pub fetch_failures: AtomicU32,
    /// Number of upcoming `fetch_artifact` calls that write half the body, then fail
    pub truncated_fetches: AtomicU32,
    pub fetches: AtomicU32,
    pub acquires: AtomicU32,
    pub starts: AtomicU32,
    pub stops: AtomicU32,
    pub credentials: Mutex<Vec<String>>,
}

impl MockCapture {
    pub fn artifacts() -> Vec<ArtifactDescriptor> {
        vec![
            artifact("sid123_channel.m3u8"),
            artifact("sid123_channel_0.mp4"),
        ]
    }
}

pub fn artifact(filename: &str) -> ArtifactDescriptor {
    ArtifactDescriptor {
        filename: filename.to_string(),
        track_type: "audio_and_video".to_string(),
        uid: "0".to_string(),
        mixed_all_user: true,
        is_playable: true,
        slice_start_time: 0,
    }
}

#[async_trait::async_trait]
impl CaptureProvider for MockCapture {
    async fn acquire(&self, _channel: &str, _uid: &str) -> Result<String> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire.load(Ordering::SeqCst) {
            bail!("acquire rejected: 503");
        }
        Ok("resource-1".to_string())
    }

    async fn start(&self, resource_id: &str, _channel: &str, _uid: &str, credential: &str) -> Result<String> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        assert_eq!(resource_id, "resource-1");
        self.credentials.lock().unwrap().push(credential.to_string());
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("start rejected: 500");
        }
        Ok("sid-1".to_string())
    }

    async fn stop(
        &self,
        _resource_id: &str,
        sid: &str,
        _channel: &str,
        _uid: &str,
    ) -> Result<Vec<ArtifactDescriptor>> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        assert_eq!(sid, "sid-1");
        if self.empty_stop.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(Self::artifacts())
    }

    async fn fetch_artifact(&self, artifact: &ArtifactDescriptor, dest: &Path) -> Result<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fetch_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fetch_failures.store(remaining - 1, Ordering::SeqCst);
            bail!("artifact {} not ready", artifact.filename);
        }

        let body = format!("bytes of {}", artifact.filename);
        let truncated = self.truncated_fetches.load(Ordering::SeqCst);
        if truncated > 0 {
            self.truncated_fetches.store(truncated - 1, Ordering::SeqCst);
            tokio::fs::write(dest, &body.as_bytes()[..body.len() / 2]).await?;
            bail!("connection reset while reading {}", artifact.filename);
        }

        tokio::fs::write(dest, body.as_bytes()).await?;
        Ok(body.len() as u64)
    }
}

/// In-memory object storage
#[derive(Default)]
pub struct MockStorage {
    pub fail: AtomicBool,
    pub objects: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
    /// Uploaded bytes by key
    pub contents: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockStorage {
    pub fn content_of(&self, key: &str) -> Option<String> {
        self.contents
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, bytes)| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MockStorage {
    async fn upload(&self, local: &Path, key: &str) -> Result<String> {
        if !local.exists() {
            bail!("{} missing", local.display());
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("storage unavailable");
        }
        let bytes = tokio::fs::read(local).await?;
        self.contents.lock().unwrap().push((key.to_string(), bytes));
        self.objects.lock().unwrap().push(key.to_string());
        Ok(format!("https://storage.test/{}", key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().retain(|k| k != key);
        self.removed.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Session store whose writes can be made to fail
pub struct FlakyStore {
    inner: LocalStore,
    pub fail_modify: AtomicBool,
    pub fail_upload_jobs: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: LocalStore::in_memory(),
            fail_modify: AtomicBool::new(false),
            fail_upload_jobs: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl SessionStore for FlakyStore {
    async fn reserve(&self, session: InterviewSession) -> EngineResult<InterviewSession> {
        self.inner.reserve(session).await
    }

    async fn get(&self, id: &str) -> EngineResult<Option<InterviewSession>> {
        self.inner.get(id).await
    }

    async fn modify(&self, id: &str, update: SessionUpdate) -> EngineResult<InterviewSession> {
        if self.fail_modify.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("disk full".to_string()));
        }
        self.inner.modify(id, update).await
    }

    async fn query(&self, query: SessionQuery) -> EngineResult<Vec<InterviewSession>> {
        self.inner.query(query).await
    }

    async fn save_upload_job(&self, job: UploadJob) -> EngineResult<()> {
        if self.fail_upload_jobs.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("disk full".to_string()));
        }
        self.inner.save_upload_job(job).await
    }

    async fn upload_job(&self, id: Uuid) -> EngineResult<Option<UploadJob>> {
        self.inner.upload_job(id).await
    }

    async fn pending_upload_jobs(&self) -> EngineResult<Vec<UploadJob>> {
        self.inner.pending_upload_jobs().await
    }
}

pub fn test_config(artifacts_dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.recording.artifacts_dir = artifacts_dir.to_path_buf();
    cfg.recording.upload_backoff_ms = 0;
    cfg.recording.upload_max_attempts = 3;
    cfg.service.public_base_url = "https://interviews.test".to_string();
    cfg
}

/// Fully wired engine with mocked providers
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub store: Arc<dyn SessionStore>,
    pub registry: Arc<SessionRegistry>,
    pub events: Arc<CollectingPublisher>,
    pub capture: Arc<MockCapture>,
    pub storage: Arc<MockStorage>,
    pub sessions: Arc<SessionService>,
    pub conversations: Arc<ConversationService>,
    pub recordings: Arc<RecordingManager>,
    pub uploads: UploadQueue,
    pub config: Config,
    pub cancel: CancellationToken,
    pub artifacts: TempDir,
}

impl Harness {
    pub fn new() -> Result<Self> {
        Self::with_store(Arc::new(LocalStore::in_memory()))
    }

    pub fn with_store(store: Arc<dyn SessionStore>) -> Result<Self> {
        let artifacts = tempfile::tempdir()?;
        let config = test_config(artifacts.path());

        let clock = Arc::new(FixedClock::new(monday_morning()));
        let registry = Arc::new(SessionRegistry::new());
        let events = Arc::new(CollectingPublisher::default());
        let capture = Arc::new(MockCapture::default());
        let storage = Arc::new(MockStorage::default());

        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let dyn_events: Arc<dyn EventPublisher> = events.clone();

        let sessions = Arc::new(SessionService::new(
            &config,
            store.clone(),
            registry.clone(),
            dyn_events.clone(),
            dyn_clock.clone(),
        )?);

        let cancel = CancellationToken::new();
        let (uploads, _handle) = UploadQueue::start(
            UploadWorker {
                store: store.clone(),
                provider: capture.clone(),
                storage: storage.clone(),
                registry: registry.clone(),
                events: dyn_events.clone(),
                clock: dyn_clock.clone(),
                settings: UploadSettings::from_config(&config.recording),
            },
            cancel.clone(),
        );

        let recordings = Arc::new(RecordingManager::new(
            capture.clone(),
            store.clone(),
            registry.clone(),
            uploads.clone(),
            dyn_events.clone(),
            dyn_clock.clone(),
        ));

        let conversations = Arc::new(ConversationService::new(
            registry.clone(),
            sessions.clone(),
            Arc::new(StaticQuestionSource::new(questions(3))),
            dyn_clock,
        ));

        Ok(Self {
            clock,
            store,
            registry,
            events,
            capture,
            storage,
            sessions,
            conversations,
            recordings,
            uploads,
            config,
            cancel,
            artifacts,
        })
    }

    /// Book Tuesday 2026-03-03 at `time` for `candidate_id`
    pub async fn book_tuesday(&self, candidate_id: &str, time: &str) -> Result<InterviewSession> {
        Ok(self
            .sessions
            .book(booking(candidate_id, "job-1", "2026-03-03", time))
            .await?)
    }

    /// Move the clock to `offset` relative to the session start
    pub fn move_to(&self, session: &InterviewSession, offset: Duration) {
        self.clock.set(session.slot.starts_at + offset);
    }

    pub fn local_dir(&self, session_id: &str) -> PathBuf {
        self.artifacts.path().join(session_id)
    }

    /// Poll until the durable recording is terminal and the live entry is gone
    pub async fn settled_recording(&self, session_id: &str) -> Result<RecordingView> {
        for _ in 0..500 {
            let session = self.sessions.get(session_id).await?;
            let terminal = session
                .recording
                .as_ref()
                .map(|r| r.status.is_terminal())
                .unwrap_or(false);
            let live = self
                .registry
                .recording(session_id, self.clock.now())
                .await
                .is_some();

            if terminal && !live {
                return Ok(self.recordings.status(session_id).await?);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        bail!("recording for {} never settled", session_id)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
