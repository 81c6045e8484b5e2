use crate::conversation::ConversationService;
use crate::recording::RecordingManager;
use crate::registry::SessionRegistry;
use crate::session::SessionService;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub conversations: Arc<ConversationService>,
    pub recordings: Arc<RecordingManager>,
    /// Live conversation/recording state, shared with the engines
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionService>,
        conversations: Arc<ConversationService>,
        recordings: Arc<RecordingManager>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            sessions,
            conversations,
            recordings,
            registry,
        }
    }
}
