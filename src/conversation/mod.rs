//! Interview conversation
//!
//! A strictly linear question/answer driver for one interviewer and one
//! candidate. The machine knows nothing about grading; the completed answer
//! log is handed to whoever evaluates it.

mod machine;
mod question;
mod service;
mod utterances;

pub use machine::{AnswerRecord, ConversationMachine, Phase, Progress, Turn, TurnAction};
pub use question::{Question, QuestionSource, StaticQuestionSource};
pub use service::{ConversationService, ConversationStatus};
