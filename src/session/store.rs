use super::model::{InterviewSession, SessionStatus};
use crate::clock::TimeWindow;
use crate::error::{EngineError, EngineResult};
use crate::recording::UploadJob;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// In-place edit applied to a copy of the stored session and committed only on `Ok`
pub type SessionUpdate = Box<dyn FnOnce(&mut InterviewSession) -> EngineResult<()> + Send>;

/// Filter for `SessionStore::query`
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    /// Sessions whose slot overlaps this window
    pub window: Option<TimeWindow>,
    pub statuses: Option<Vec<SessionStatus>>,
    pub exclude_id: Option<String>,
}

impl SessionQuery {
    /// Blocking sessions overlapping `window`
    pub fn blocking_in(window: TimeWindow) -> Self {
        Self {
            window: Some(window),
            statuses: Some(SessionStatus::BLOCKING.to_vec()),
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, id: Option<String>) -> Self {
        self.exclude_id = id;
        self
    }

    pub fn matches(&self, session: &InterviewSession) -> bool {
        if self.exclude_id.as_deref() == Some(session.id.as_str()) {
            return false;
        }

        if let Some(window) = &self.window {
            if !window.overlaps(&session.window()) {
                return false;
            }
        }

        match &self.statuses {
            Some(statuses) => statuses.contains(&session.status),
            None => true,
        }
    }
}

/// Durable store for interview sessions and upload jobs
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert `session` only if its slot is free.
    ///
    /// Fails with `Conflict` when a blocking session overlaps the slot, or
    /// when the candidate already holds a blocking session for the same job.
    async fn reserve(&self, session: InterviewSession) -> EngineResult<InterviewSession>;

    async fn get(&self, id: &str) -> EngineResult<Option<InterviewSession>>;

    /// Apply `update` atomically. A changed slot is re-checked against every
    /// other blocking session before the edit is committed.
    async fn modify(&self, id: &str, update: SessionUpdate) -> EngineResult<InterviewSession>;

    /// Matching sessions ordered by slot start
    async fn query(&self, query: SessionQuery) -> EngineResult<Vec<InterviewSession>>;

    async fn save_upload_job(&self, job: UploadJob) -> EngineResult<()>;

    async fn upload_job(&self, id: Uuid) -> EngineResult<Option<UploadJob>>;

    /// Jobs not yet completed or failed
    async fn pending_upload_jobs(&self) -> EngineResult<Vec<UploadJob>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    sessions: HashMap<String, InterviewSession>,
    #[serde(default)]
    upload_jobs: HashMap<Uuid, UploadJob>,
}

impl Snapshot {
    fn slot_conflicts(&self, candidate: &InterviewSession) -> Vec<TimeWindow> {
        let query = SessionQuery::blocking_in(candidate.window()).excluding(Some(candidate.id.clone()));
        let mut conflicts: Vec<TimeWindow> = self
            .sessions
            .values()
            .filter(|s| query.matches(s))
            .map(|s| s.window())
            .collect();
        conflicts.sort_by_key(|w| w.start);
        conflicts
    }

    fn holds_active_for_job(&self, candidate: &InterviewSession) -> bool {
        self.sessions.values().any(|s| {
            s.id != candidate.id
                && s.is_blocking()
                && s.candidate.id == candidate.candidate.id
                && s.job_id == candidate.job_id
        })
    }
}

/// Process-local store, optionally snapshotted to a JSON file.
///
/// Every write holds the store lock for the whole check-then-insert, which is
/// what makes `reserve` a single reserve-if-free step.
pub struct LocalStore {
    state: RwLock<Snapshot>,
    path: Option<PathBuf>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(Snapshot::default()),
            path: None,
        }
    }

    /// Open (or create on first write) the snapshot at `path`
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse store snapshot {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read store snapshot {}", path.display()))
            }
        };

        info!(
            "Opened session store at {} ({} sessions, {} upload jobs)",
            path.display(),
            snapshot.sessions.len(),
            snapshot.upload_jobs.len()
        );

        Ok(Self {
            state: RwLock::new(snapshot),
            path: Some(path),
        })
    }

    async fn persist(&self, snapshot: &Snapshot) -> EngineResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        write_snapshot(path, snapshot)
            .await
            .map_err(|e| EngineError::Storage(format!("{:#}", e)))?;

        debug!("Persisted store snapshot to {}", path.display());
        Ok(())
    }
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(snapshot).context("Failed to serialize store")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;

    Ok(())
}

#[async_trait::async_trait]
impl SessionStore for LocalStore {
    async fn reserve(&self, session: InterviewSession) -> EngineResult<InterviewSession> {
        let mut state = self.state.write().await;

        if state.sessions.contains_key(&session.id) {
            return Err(EngineError::InvalidState(format!(
                "interview {} already exists",
                session.id
            )));
        }

        if session.is_blocking() {
            let conflicts = state.slot_conflicts(&session);
            if !conflicts.is_empty() {
                return Err(EngineError::conflict(
                    "This time slot is already booked",
                    conflicts,
                ));
            }

            if state.holds_active_for_job(&session) {
                return Err(EngineError::conflict(
                    "Candidate already has an active interview for this job",
                    Vec::new(),
                ));
            }
        }

        state.sessions.insert(session.id.clone(), session.clone());
        if let Err(e) = self.persist(&state).await {
            state.sessions.remove(&session.id);
            return Err(e);
        }

        Ok(session)
    }

    async fn get(&self, id: &str) -> EngineResult<Option<InterviewSession>> {
        Ok(self.state.read().await.sessions.get(id).cloned())
    }

    async fn modify(&self, id: &str, update: SessionUpdate) -> EngineResult<InterviewSession> {
        let mut state = self.state.write().await;

        let current = state
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Interview {} not found", id)))?;

        let mut updated = current.clone();
        update(&mut updated)?;

        if updated.is_blocking() && updated.window() != current.window() {
            let conflicts = state.slot_conflicts(&updated);
            if !conflicts.is_empty() {
                return Err(EngineError::conflict(
                    "The requested time slot is already booked",
                    conflicts,
                ));
            }
        }

        state.sessions.insert(id.to_string(), updated.clone());
        if let Err(e) = self.persist(&state).await {
            state.sessions.insert(id.to_string(), current);
            return Err(e);
        }

        Ok(updated)
    }

    async fn query(&self, query: SessionQuery) -> EngineResult<Vec<InterviewSession>> {
        let state = self.state.read().await;
        let mut sessions: Vec<InterviewSession> = state
            .sessions
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.slot.starts_at.cmp(&b.slot.starts_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn save_upload_job(&self, job: UploadJob) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let previous = state.upload_jobs.insert(job.id, job.clone());

        if let Err(e) = self.persist(&state).await {
            match previous {
                Some(previous) => state.upload_jobs.insert(job.id, previous),
                None => state.upload_jobs.remove(&job.id),
            };
            return Err(e);
        }

        Ok(())
    }

    async fn upload_job(&self, id: Uuid) -> EngineResult<Option<UploadJob>> {
        Ok(self.state.read().await.upload_jobs.get(&id).cloned())
    }

    async fn pending_upload_jobs(&self) -> EngineResult<Vec<UploadJob>> {
        let state = self.state.read().await;
        let mut jobs: Vec<UploadJob> = state
            .upload_jobs
            .values()
            .filter(|j| !j.status.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}
