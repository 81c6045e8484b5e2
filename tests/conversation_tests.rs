mod common;

use anyhow::Result;
use chrono::Duration;
use common::{monday_morning, questions, FlakyStore, Harness};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use interview_orchestrator::{
    ConversationMachine, EngineError, Phase, Progress, Question, TurnAction,
};

fn started(n: u32) -> ConversationMachine {
    let mut machine = ConversationMachine::new();
    machine
        .initialize(questions(n), "Backend Engineer", "Ada", monday_morning())
        .unwrap();
    machine
}

#[test]
fn test_three_question_walkthrough() {
    let mut machine = started(3);
    let now = monday_morning();

    machine.submit_answer("First answer", None, now).unwrap();
    let second = machine.submit_answer("Second answer", None, now).unwrap();
    assert_eq!(second.action, TurnAction::MoveNext);
    assert_eq!(
        machine.progress(),
        Progress {
            current: 2,
            total: 3,
            percentage: 66
        }
    );
    assert_eq!(machine.current_question().unwrap().id, 3);

    let last = machine.submit_answer("Third answer", None, now).unwrap();
    assert!(last.completed);
    assert_eq!(last.action, TurnAction::Complete);
    assert!(last.question.is_none());
    assert!(machine.is_complete());
    assert!(machine.current_question().is_none());
    assert_eq!(machine.progress().percentage, 100);

    let indices: Vec<usize> = machine.answers().iter().map(|a| a.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_redundant_submit_leaves_log_unchanged() {
    let mut machine = started(2);
    let now = monday_morning();
    machine.submit_answer("one", None, now).unwrap();
    machine.submit_answer("two", None, now).unwrap();

    let err = machine.submit_answer("three", None, now).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(machine.answers().len(), 2);
}

#[test]
fn test_stale_index_is_rejected() {
    let mut machine = started(3);
    let now = monday_morning();
    machine.submit_answer("one", Some(0), now).unwrap();

    let err = machine.submit_answer("one again", Some(0), now).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(machine.index(), 1);

    machine.submit_answer("two", Some(1), now).unwrap();
    assert_eq!(machine.index(), 2);
}

#[test]
fn test_empty_inputs_are_validation_errors() {
    let mut machine = ConversationMachine::new();
    let err = machine
        .initialize(Vec::new(), "Role", "Ada", monday_morning())
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(machine.phase(), Phase::NotStarted);

    let mut machine = started(2);
    let err = machine.submit_answer("   ", None, monday_morning()).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(machine.index(), 0);
}

#[test]
fn test_answers_are_trimmed_and_stamped() {
    let mut machine = started(1);
    let answered_at = monday_morning() + Duration::minutes(3);

    machine.submit_answer("  I like Rust \n", None, answered_at).unwrap();

    let record = &machine.answers()[0];
    assert_eq!(record.answer, "I like Rust");
    assert_eq!(record.question_id, 1);
    assert_eq!(record.answered_at, answered_at);
}

#[test]
fn test_greeting_and_fallback_names() {
    let mut machine = ConversationMachine::new();
    let turn = machine
        .initialize(questions(2), "Data Analyst", "Grace", monday_morning())
        .unwrap();
    assert_eq!(turn.action, TurnAction::Start);
    assert!(turn.message.contains("Grace"));
    assert!(turn.message.contains("Data Analyst"));
    assert!(turn.message.contains("2 questions"));
    assert!(turn.message.contains("Question number 1?"));
    assert_eq!(machine.phase(), Phase::Greeting);

    let mut anonymous = ConversationMachine::new();
    let turn = anonymous
        .initialize(vec![Question::new(9, "Why?")], " ", "", monday_morning())
        .unwrap();
    assert!(turn.message.contains("Candidate"));
    assert!(turn.message.contains("Position"));
    assert!(turn.message.contains("1 question."));
}

#[test]
fn test_repeat_and_reinitialize() {
    let mut machine = started(3);
    machine.submit_answer("one", None, monday_morning()).unwrap();

    let repeated = machine.repeat().unwrap();
    assert_eq!(repeated.action, TurnAction::Repeat);
    assert!(repeated.message.contains("Question number 2?"));
    assert_eq!(machine.index(), 1);

    let err = machine
        .initialize(questions(1), "Role", "Ada", monday_morning())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(machine.questions().len(), 3);
}

#[test]
fn test_submit_before_initialize() {
    let mut machine = ConversationMachine::new();
    let err = machine.submit_answer("hi", None, monday_morning()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert!(machine.repeat().is_err());
}

#[test]
fn test_phase_wire_format() {
    let json = serde_json::to_value(Phase::AwaitingAnswer(1)).unwrap();
    assert_eq!(json, serde_json::json!({ "phase": "awaiting_answer", "index": 1 }));

    let json = serde_json::to_value(Phase::Complete).unwrap();
    assert_eq!(json, serde_json::json!({ "phase": "complete" }));
}

#[tokio::test]
async fn test_service_drives_conversation_to_durable_log() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    let turn = harness
        .conversations
        .initialize(&session.id, "cand-1", None)
        .await?;
    assert_eq!(turn.progress.total, 3);

    for i in 0..3 {
        harness
            .conversations
            .respond(&session.id, "cand-1", &format!("answer {}", i), Some(i))
            .await?;
    }

    let stored = harness.sessions.get(&session.id).await?;
    assert_eq!(stored.answers.len(), 3);
    assert_eq!(harness.registry.stats().await.conversations, 0);

    let status = harness.conversations.status(&session.id, "cand-1").await?;
    assert!(status.complete);
    assert_eq!(status.progress.percentage, 100);

    let err = harness
        .conversations
        .respond(&session.id, "cand-1", "more", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = harness
        .conversations
        .initialize(&session.id, "cand-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted));
    Ok(())
}

#[tokio::test]
async fn test_service_keys_by_participant() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    harness
        .conversations
        .initialize(&session.id, "cand-1", Some(questions(2)))
        .await?;

    let err = harness
        .conversations
        .initialize(&session.id, "cand-1", Some(questions(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let err = harness
        .conversations
        .respond(&session.id, "observer", "hello", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let turn = harness.conversations.repeat(&session.id, "cand-1").await?;
    assert_eq!(turn.question.map(|q| q.id), Some(1));

    let status = harness.conversations.status(&session.id, "cand-1").await?;
    assert_eq!(status.phase, Phase::Greeting);
    assert!(!status.complete);
    Ok(())
}

#[tokio::test]
async fn test_service_rejects_unknown_session() -> Result<()> {
    let harness = Harness::new()?;

    let err = harness
        .conversations
        .initialize("INT-0-DEADBEEF", "cand-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_final_answer_survives_failed_save() -> Result<()> {
    let store = Arc::new(FlakyStore::new());
    let harness = Harness::with_store(store.clone())?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    harness
        .conversations
        .initialize(&session.id, "cand-1", None)
        .await?;
    for i in 0..2 {
        harness
            .conversations
            .respond(&session.id, "cand-1", &format!("answer {}", i), Some(i))
            .await?;
    }

    store.fail_modify.store(true, Ordering::SeqCst);
    let err = harness
        .conversations
        .respond(&session.id, "cand-1", "answer 2", Some(2))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    // the last question is still open
    let status = harness.conversations.status(&session.id, "cand-1").await?;
    assert!(!status.complete);
    assert_eq!(status.progress.current, 2);
    assert_eq!(status.current_question.map(|q| q.id), Some(3));

    store.fail_modify.store(false, Ordering::SeqCst);
    let turn = harness
        .conversations
        .respond(&session.id, "cand-1", "answer 2", Some(2))
        .await?;
    assert!(turn.completed);

    let stored = harness.sessions.get(&session.id).await?;
    assert_eq!(stored.answers.len(), 3);
    assert_eq!(stored.answers[2].answer, "answer 2");
    assert_eq!(harness.registry.stats().await.conversations, 0);
    Ok(())
}
