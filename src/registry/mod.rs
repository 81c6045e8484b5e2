//! Live session state
//!
//! The registry is the only owner of in-flight conversation and recording
//! state. It is injected wherever it is needed; entries leave on terminal
//! transitions, on explicit session eviction, or when idle past the TTL.

use crate::conversation::ConversationMachine;
use crate::error::{EngineError, EngineResult};
use crate::recording::RecordingState;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub type SharedConversation = Arc<Mutex<ConversationMachine>>;
pub type SharedRecording = Arc<Mutex<RecordingState>>;

/// Conversations are per participant within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub session_id: String,
    pub participant_id: String,
}

impl SessionKey {
    pub fn new(session_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            participant_id: participant_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub conversations: usize,
    pub recordings: usize,
}

struct Entry<T> {
    value: Arc<Mutex<T>>,
    touched_at: DateTime<Utc>,
}

/// Keyed map with atomic insert-if-absent, lookup-and-touch and removal
struct Table<K, T> {
    entries: RwLock<HashMap<K, Entry<T>>>,
}

impl<K: Eq + Hash + Clone, T> Table<K, T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn insert_if_absent(&self, key: K, value: T, now: DateTime<Utc>) -> Option<Arc<Mutex<T>>> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return None;
        }

        let value = Arc::new(Mutex::new(value));
        entries.insert(
            key,
            Entry {
                value: Arc::clone(&value),
                touched_at: now,
            },
        );
        Some(value)
    }

    async fn get(&self, key: &K, now: DateTime<Utc>) -> Option<Arc<Mutex<T>>> {
        let mut entries = self.entries.write().await;
        entries.get_mut(key).map(|entry| {
            entry.touched_at = now;
            Arc::clone(&entry.value)
        })
    }

    async fn remove(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    async fn retain(&self, mut keep: impl FnMut(&K, &Entry<T>) -> bool) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, e| keep(k, e));
        before - entries.len()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

pub struct SessionRegistry {
    conversations: Table<SessionKey, ConversationMachine>,
    recordings: Table<String, RecordingState>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            conversations: Table::new(),
            recordings: Table::new(),
        }
    }

    /// Register a conversation; fails if one is already live for `key`
    pub async fn insert_conversation(
        &self,
        key: SessionKey,
        machine: ConversationMachine,
        now: DateTime<Utc>,
    ) -> EngineResult<SharedConversation> {
        let session_id = key.session_id.clone();
        self.conversations
            .insert_if_absent(key, machine, now)
            .await
            .ok_or_else(|| {
                EngineError::InvalidState(format!(
                    "conversation for interview {} is already active",
                    session_id
                ))
            })
    }

    pub async fn conversation(&self, key: &SessionKey, now: DateTime<Utc>) -> Option<SharedConversation> {
        self.conversations.get(key, now).await
    }

    pub async fn remove_conversation(&self, key: &SessionKey) -> bool {
        let removed = self.conversations.remove(key).await;
        if removed {
            debug!(session_id = %key.session_id, participant_id = %key.participant_id, "Conversation removed from registry");
        }
        removed
    }

    /// Register a recording; fails if one is already live for the session
    pub async fn insert_recording(
        &self,
        state: RecordingState,
        now: DateTime<Utc>,
    ) -> EngineResult<SharedRecording> {
        let session_id = state.session_id.clone();
        self.recordings
            .insert_if_absent(session_id.clone(), state, now)
            .await
            .ok_or_else(|| {
                EngineError::InvalidState(format!(
                    "recording for interview {} is already active",
                    session_id
                ))
            })
    }

    pub async fn recording(&self, session_id: &str, now: DateTime<Utc>) -> Option<SharedRecording> {
        self.recordings.get(&session_id.to_string(), now).await
    }

    pub async fn remove_recording(&self, session_id: &str) -> bool {
        self.recordings.remove(&session_id.to_string()).await
    }

    /// Drop every live entry belonging to `session_id`
    pub async fn evict_session(&self, session_id: &str) -> usize {
        let conversations = self
            .conversations
            .retain(|key, _| key.session_id != session_id)
            .await;
        let recordings = self.recordings.retain(|key, _| key != session_id).await;

        let evicted = conversations + recordings;
        if evicted > 0 {
            info!(session_id = %session_id, evicted, "Evicted live session state");
        }
        evicted
    }

    /// Drop entries not touched within `ttl` of `now`
    pub async fn evict_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let cutoff = now - ttl;
        let conversations = self
            .conversations
            .retain(|_, entry| entry.touched_at >= cutoff)
            .await;
        let recordings = self
            .recordings
            .retain(|_, entry| entry.touched_at >= cutoff)
            .await;

        conversations + recordings
    }

    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            conversations: self.conversations.len().await,
            recordings: self.recordings.len().await,
        }
    }
}
