use super::machine::{ConversationMachine, Phase, Progress, Turn};
use super::question::{Question, QuestionSource};
use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::registry::{SessionKey, SessionRegistry, SharedConversation};
use crate::session::SessionService;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot of a conversation for status polling
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStatus {
    pub phase: Phase,
    pub progress: Progress,
    pub current_question: Option<Question>,
    pub complete: bool,
}

/// Conversation steps keyed by session and participant
pub struct ConversationService {
    registry: Arc<SessionRegistry>,
    sessions: Arc<SessionService>,
    questions: Arc<dyn QuestionSource>,
    clock: Arc<dyn Clock>,
}

impl ConversationService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        sessions: Arc<SessionService>,
        questions: Arc<dyn QuestionSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            sessions,
            questions,
            clock,
        }
    }

    /// Start the interview. Without explicit questions the job's bank is used.
    pub async fn initialize(
        &self,
        session_id: &str,
        participant_id: &str,
        questions: Option<Vec<Question>>,
    ) -> EngineResult<Turn> {
        let session = self.sessions.get(session_id).await?;
        if !session.answers.is_empty() {
            return Err(EngineError::AlreadyCompleted);
        }

        let questions = match questions {
            Some(questions) => questions,
            None => self
                .questions
                .questions_for(&session.job_id)
                .await
                .map_err(|e| EngineError::UpstreamFailure(format!("question source: {:#}", e)))?,
        };

        let now = self.clock.now();
        let mut machine = ConversationMachine::new();
        let turn = machine.initialize(questions, &session.job_title, &session.candidate.name, now)?;

        self.registry
            .insert_conversation(SessionKey::new(session_id, participant_id), machine, now)
            .await?;

        info!(
            session_id = %session_id,
            participant_id = %participant_id,
            questions = turn.progress.total,
            "Conversation initialized"
        );
        Ok(turn)
    }

    /// Submit the answer to the current question.
    ///
    /// The final answer only takes effect once the answer log is durable, so a
    /// failed write leaves the last question open for a retry.
    pub async fn respond(
        &self,
        session_id: &str,
        participant_id: &str,
        answer: &str,
        expected_index: Option<usize>,
    ) -> EngineResult<Turn> {
        let key = SessionKey::new(session_id, participant_id);
        let shared = self.live(&key).await?;
        let mut machine = shared.lock().await;

        let mut next = machine.clone();
        let turn = match next.submit_answer(answer, expected_index, self.clock.now()) {
            Ok(turn) => turn,
            Err(e) => {
                warn!(session_id = %session_id, participant_id = %participant_id, "Answer rejected: {}", e);
                return Err(e);
            }
        };

        if turn.completed {
            if let Err(e) = self
                .sessions
                .record_answers(session_id, next.answers().to_vec())
                .await
            {
                warn!(
                    session_id = %session_id,
                    participant_id = %participant_id,
                    "Failed to save answers, final question stays open: {}",
                    e
                );
                return Err(e);
            }
        }

        *machine = next;
        drop(machine);

        info!(
            session_id = %session_id,
            participant_id = %participant_id,
            current = turn.progress.current,
            total = turn.progress.total,
            "Answer recorded"
        );

        if turn.completed {
            self.registry.remove_conversation(&key).await;
            info!(session_id = %session_id, participant_id = %participant_id, "Conversation complete");
        }

        Ok(turn)
    }

    pub async fn repeat(&self, session_id: &str, participant_id: &str) -> EngineResult<Turn> {
        let shared = self
            .live(&SessionKey::new(session_id, participant_id))
            .await?;
        let machine = shared.lock().await;
        machine.repeat()
    }

    pub async fn status(&self, session_id: &str, participant_id: &str) -> EngineResult<ConversationStatus> {
        let key = SessionKey::new(session_id, participant_id);

        if let Some(shared) = self.registry.conversation(&key, self.clock.now()).await {
            let machine = shared.lock().await;
            return Ok(ConversationStatus {
                phase: machine.phase(),
                progress: machine.progress(),
                current_question: machine.current_question().cloned(),
                complete: machine.is_complete(),
            });
        }

        let session = self.sessions.get(session_id).await?;
        let answered = session.answers.len();
        let complete = answered > 0;

        Ok(ConversationStatus {
            phase: if complete {
                Phase::Complete
            } else {
                Phase::NotStarted
            },
            progress: Progress {
                current: answered,
                total: answered,
                percentage: if complete { 100 } else { 0 },
            },
            current_question: None,
            complete,
        })
    }

    async fn live(&self, key: &SessionKey) -> EngineResult<SharedConversation> {
        if let Some(shared) = self.registry.conversation(key, self.clock.now()).await {
            return Ok(shared);
        }

        let session = self.sessions.get(&key.session_id).await?;
        if !session.answers.is_empty() {
            return Err(EngineError::InvalidState(
                "conversation is already complete".to_string(),
            ));
        }

        Err(EngineError::InvalidState(
            "conversation has not been initialized".to_string(),
        ))
    }
}
