use super::question::Question;
use super::utterances;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the conversation stands
///
/// `Greeting` is the state right after initialization, before the first
/// answer; it waits on question 0 exactly like `AwaitingAnswer(0)` would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Greeting,
    AwaitingAnswer(usize),
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Start,
    MoveNext,
    Repeat,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    /// Whole percent, truncated
    pub percentage: u8,
}

/// One interviewer utterance produced by a state change
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub message: String,
    pub action: TurnAction,
    pub question: Option<Question>,
    pub progress: Progress,
    pub completed: bool,
}

/// One entry of the append-only answer log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub index: usize,
    pub question_id: u32,
    pub question_text: String,
    pub answer: String,
    pub answered_at: DateTime<Utc>,
}

/// Linear interview driver: no skipping, no re-answering, no reordering
#[derive(Debug, Clone)]
pub struct ConversationMachine {
    phase: Phase,
    questions: Vec<Question>,
    answers: Vec<AnswerRecord>,
    job_title: String,
    candidate_name: String,
    started_at: Option<DateTime<Utc>>,
}

impl Default for ConversationMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::NotStarted,
            questions: Vec::new(),
            answers: Vec::new(),
            job_title: String::new(),
            candidate_name: String::new(),
            started_at: None,
        }
    }

    pub fn initialize(
        &mut self,
        questions: Vec<Question>,
        job_title: &str,
        candidate_name: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Turn> {
        if self.phase != Phase::NotStarted {
            return Err(EngineError::InvalidState(
                "conversation is already initialized".to_string(),
            ));
        }

        let Some(first) = questions.first().cloned() else {
            return Err(EngineError::Validation(
                "at least one question is required".to_string(),
            ));
        };

        let job_title = non_blank_or(job_title, "Position");
        let candidate_name = non_blank_or(candidate_name, "Candidate");
        let message = utterances::greeting(&candidate_name, &job_title, questions.len(), &first);

        self.questions = questions;
        self.job_title = job_title;
        self.candidate_name = candidate_name;
        self.started_at = Some(now);
        self.phase = Phase::Greeting;

        Ok(Turn {
            message,
            action: TurnAction::Start,
            question: Some(first),
            progress: self.progress(),
            completed: false,
        })
    }

    /// Record the answer to the current question and advance by one.
    ///
    /// `expected_index` is the question index the caller believes it is
    /// answering; a stale or duplicated submission is rejected untouched.
    pub fn submit_answer(
        &mut self,
        raw_input: &str,
        expected_index: Option<usize>,
        now: DateTime<Utc>,
    ) -> EngineResult<Turn> {
        let index = match self.phase {
            Phase::Greeting => 0,
            Phase::AwaitingAnswer(index) => index,
            Phase::NotStarted => {
                return Err(EngineError::InvalidState(
                    "conversation has not been initialized".to_string(),
                ))
            }
            Phase::Complete => {
                return Err(EngineError::InvalidState(
                    "conversation is already complete".to_string(),
                ))
            }
        };

        let answer = raw_input.trim();
        if answer.is_empty() {
            return Err(EngineError::Validation("answer must not be empty".to_string()));
        }

        if let Some(expected) = expected_index {
            if expected != index {
                return Err(EngineError::InvalidState(format!(
                    "answer targets question {} but question {} is current",
                    expected, index
                )));
            }
        }

        let Some(question) = self.questions.get(index) else {
            return Err(EngineError::InvalidState(format!(
                "question index {} out of range",
                index
            )));
        };

        self.answers.push(AnswerRecord {
            index,
            question_id: question.id,
            question_text: question.text.clone(),
            answer: answer.to_string(),
            answered_at: now,
        });

        let next = index + 1;
        match self.questions.get(next).cloned() {
            Some(next_question) => {
                self.phase = Phase::AwaitingAnswer(next);
                Ok(Turn {
                    message: utterances::transition(&next_question),
                    action: TurnAction::MoveNext,
                    question: Some(next_question),
                    progress: self.progress(),
                    completed: false,
                })
            }
            None => {
                self.phase = Phase::Complete;
                Ok(Turn {
                    message: utterances::closing(&self.candidate_name),
                    action: TurnAction::Complete,
                    question: None,
                    progress: self.progress(),
                    completed: true,
                })
            }
        }
    }

    /// Re-state the current question without touching state
    pub fn repeat(&self) -> EngineResult<Turn> {
        match self.current_question() {
            Some(question) => Ok(Turn {
                message: utterances::repeat(question),
                action: TurnAction::Repeat,
                question: Some(question.clone()),
                progress: self.progress(),
                completed: false,
            }),
            None => Err(EngineError::InvalidState(match self.phase {
                Phase::Complete => "conversation is already complete".to_string(),
                _ => "conversation has not been initialized".to_string(),
            })),
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            Phase::Greeting => self.questions.first(),
            Phase::AwaitingAnswer(index) => self.questions.get(index),
            Phase::NotStarted | Phase::Complete => None,
        }
    }

    /// Index of the question currently awaiting an answer
    pub fn index(&self) -> usize {
        self.answers.len()
    }

    pub fn progress(&self) -> Progress {
        let current = self.index();
        let total = self.questions.len();
        let percentage = if total == 0 {
            0
        } else {
            ((current * 100) / total) as u8
        };

        Progress {
            current,
            total,
            percentage,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
