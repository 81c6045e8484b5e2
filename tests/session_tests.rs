mod common;

use anyhow::Result;
use chrono::Duration;
use common::{at, booking, date, questions, Harness};
use interview_orchestrator::scheduling::Unavailable;
use interview_orchestrator::session::{
    ConfirmationStatus, NotificationKind, RescheduleInput, RescheduleState, SlotRequest,
};
use interview_orchestrator::{EngineError, EventKind, LocalStore, SessionStatus, SessionStore};
use std::sync::Arc;

#[tokio::test]
async fn test_booking_creates_scheduled_session() -> Result<()> {
    let harness = Harness::new()?;

    let session = harness.book_tuesday("cand-1", "10:00").await?;

    assert!(session.id.starts_with("INT-"));
    assert_eq!(session.token.len(), 64);
    assert!(session.token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(session.status, SessionStatus::Scheduled);
    assert_eq!(session.confirmation, ConfirmationStatus::Pending);
    assert_eq!(session.slot.starts_at, at("2026-03-03T10:00:00Z"));
    assert_eq!(session.slot.duration_minutes, 45);
    assert_eq!(session.channel, session.id);
    assert!(!session.demo);
    assert_eq!(
        session.link,
        format!(
            "https://interviews.test/interview/{}?token={}&candidate=cand-1",
            session.id, session.token
        )
    );
    assert_eq!(session.notifications[0].kind, NotificationKind::Scheduled);
    assert_eq!(harness.events.kinds_for(&session.id), vec![EventKind::Booked]);
    Ok(())
}

#[tokio::test]
async fn test_double_booking_reports_conflicting_interval() -> Result<()> {
    let harness = Harness::new()?;
    let first = harness.book_tuesday("cand-1", "10:00").await?;

    let err = harness.book_tuesday("cand-2", "10:00").await.unwrap_err();
    let err = err.downcast::<EngineError>()?;

    match err {
        EngineError::Conflict { conflicts, .. } => {
            assert_eq!(conflicts, vec![first.window()]);
        }
        other => panic!("expected conflict, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot() -> Result<()> {
    let harness = Harness::new()?;
    let sessions = harness.sessions.clone();

    let (a, b) = tokio::join!(
        sessions.book(booking("cand-1", "job-1", "2026-03-03", "14:00")),
        sessions.book(booking("cand-2", "job-1", "2026-03-03", "14:00")),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(EngineError::Conflict { .. })));

    let day = harness.sessions.day_availability(date("2026-03-03"), None).await?;
    assert_eq!(day.booked_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_one_active_session_per_candidate_and_job() -> Result<()> {
    let harness = Harness::new()?;
    harness.book_tuesday("cand-1", "10:00").await?;

    let err = harness
        .sessions
        .book(booking("cand-1", "job-1", "2026-03-04", "10:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));

    harness
        .sessions
        .book(booking("cand-1", "job-2", "2026-03-04", "10:00"))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_booking_validation() -> Result<()> {
    let harness = Harness::new()?;

    let mut bad_email = booking("cand-1", "job-1", "2026-03-03", "10:00");
    bad_email.candidate.email = "not-an-email".to_string();
    assert!(matches!(
        harness.sessions.book(bad_email).await,
        Err(EngineError::Validation(_))
    ));

    let off_catalog = booking("cand-1", "job-1", "2026-03-03", "10:15");
    assert!(matches!(
        harness.sessions.book(off_catalog).await,
        Err(EngineError::Validation(_))
    ));

    let past = booking("cand-1", "job-1", "2026-02-27", "10:00");
    assert!(matches!(
        harness.sessions.book(past).await,
        Err(EngineError::Validation(_))
    ));

    let bad_date = booking("cand-1", "job-1", "03/03/2026", "10:00");
    assert!(matches!(
        harness.sessions.book(bad_date).await,
        Err(EngineError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_availability_reflects_bookings() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    let day = harness.sessions.day_availability(date("2026-03-03"), None).await?;
    assert_eq!(day.slot("10:00").unwrap().reason, Some(Unavailable::Booked));
    assert_eq!(day.available_count, 5);

    let excluding = harness
        .sessions
        .day_availability(date("2026-03-03"), Some(session.id.clone()))
        .await?;
    assert!(excluding.slot("10:00").unwrap().available);

    let upcoming = harness.sessions.upcoming_availability(Some(7), None).await?;
    let first = upcoming.keys().next().copied();
    assert_eq!(first, Some(date("2026-03-03")));
    assert_eq!(upcoming[&date("2026-03-03")].booked_count, 1);
    assert!(!upcoming.contains_key(&date("2026-03-07")));
    Ok(())
}

#[tokio::test]
async fn test_demo_booking_gets_prefixed_id() -> Result<()> {
    let harness = Harness::new()?;
    let mut request = booking("cand-1", "job-1", "2026-03-03", "11:00");
    request.demo = true;

    let session = harness.sessions.book(request).await?;
    assert!(session.id.starts_with("TEST-INT-"));
    assert!(session.demo);
    Ok(())
}

#[tokio::test]
async fn test_confirm_and_reschedule_flow() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    let confirmed = harness.sessions.confirm(&session.id).await?;
    assert_eq!(confirmed.status, SessionStatus::Confirmed);
    assert_eq!(confirmed.confirmation, ConfirmationStatus::Confirmed);

    let missing_reason = harness
        .sessions
        .request_reschedule(
            &session.id,
            RescheduleInput {
                date: "2026-03-04".to_string(),
                time: "14:00".to_string(),
                reason: "  ".to_string(),
            },
        )
        .await;
    assert!(matches!(missing_reason, Err(EngineError::Validation(_))));

    let requested = harness
        .sessions
        .request_reschedule(
            &session.id,
            RescheduleInput {
                date: "2026-03-04".to_string(),
                time: "14:00".to_string(),
                reason: "Travelling".to_string(),
            },
        )
        .await?;
    assert_eq!(requested.slot.starts_at, session.slot.starts_at);
    assert_eq!(requested.status, SessionStatus::Confirmed);
    assert_eq!(requested.confirmation, ConfirmationStatus::Rescheduled);
    assert_eq!(requested.reschedule_requests[0].status, RescheduleState::Pending);

    let moved = harness
        .sessions
        .apply_reschedule(
            &session.id,
            SlotRequest {
                date: "2026-03-04".to_string(),
                time: "14:00".to_string(),
            },
        )
        .await?;
    assert_eq!(moved.status, SessionStatus::Rescheduled);
    assert_eq!(moved.slot.starts_at, at("2026-03-04T14:00:00Z"));
    assert_eq!(moved.reschedule_requests[0].status, RescheduleState::Approved);
    assert_eq!(moved.confirmation, ConfirmationStatus::Pending);

    // old slot is free again, the new one is held
    harness.book_tuesday("cand-2", "10:00").await?;
    let err = harness
        .sessions
        .book(booking("cand-3", "job-1", "2026-03-04", "14:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { .. }));

    let reconfirmed = harness.sessions.confirm(&session.id).await?;
    assert_eq!(reconfirmed.status, SessionStatus::Confirmed);
    Ok(())
}

#[tokio::test]
async fn test_reschedule_onto_taken_slot_conflicts() -> Result<()> {
    let harness = Harness::new()?;
    let mine = harness.book_tuesday("cand-1", "10:00").await?;
    let theirs = harness.book_tuesday("cand-2", "14:00").await?;

    let err = harness
        .sessions
        .apply_reschedule(
            &mine.id,
            SlotRequest {
                date: "2026-03-03".to_string(),
                time: "14:00".to_string(),
            },
        )
        .await
        .unwrap_err();

    match err {
        EngineError::Conflict { conflicts, .. } => assert_eq!(conflicts, vec![theirs.window()]),
        other => panic!("expected conflict, got {:?}", other),
    }

    let unchanged = harness.sessions.get(&mine.id).await?;
    assert_eq!(unchanged.status, SessionStatus::Scheduled);
    assert_eq!(unchanged.slot.starts_at, mine.slot.starts_at);
    Ok(())
}

#[tokio::test]
async fn test_cancel_frees_slot_and_evicts_live_state() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;
    harness
        .conversations
        .initialize(&session.id, "cand-1", Some(questions(2)))
        .await?;
    assert_eq!(harness.registry.stats().await.conversations, 1);

    let cancelled = harness.sessions.cancel(&session.id).await?;
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
    assert_eq!(cancelled.confirmation, ConfirmationStatus::Declined);
    assert_eq!(harness.registry.stats().await.conversations, 0);

    assert!(matches!(
        harness.sessions.cancel(&session.id).await,
        Err(EngineError::InvalidState(_))
    ));

    harness.book_tuesday("cand-2", "10:00").await?;

    harness.move_to(&session, Duration::zero());
    let err = harness
        .sessions
        .check_access(&session.id, &session.token, "cand-1")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    Ok(())
}

#[tokio::test]
async fn test_begin_and_complete() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    harness.move_to(&session, -Duration::minutes(30));
    let err = harness
        .sessions
        .begin(&session.id, &session.token, "cand-1")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotStarted { .. }));

    harness.move_to(&session, -Duration::minutes(5));
    let started = harness
        .sessions
        .begin(&session.id, &session.token, "cand-1")
        .await?;
    assert_eq!(started.status, SessionStatus::InProgress);

    let again = harness
        .sessions
        .begin(&session.id, &session.token, "cand-1")
        .await?;
    assert_eq!(again.status, SessionStatus::InProgress);

    let completed = harness
        .sessions
        .complete(&session.id, &session.token, "cand-1")
        .await?;
    assert_eq!(completed.status, SessionStatus::Completed);
    assert!(completed
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Completion));

    let err = harness
        .sessions
        .check_access(&session.id, &session.token, "cand-1")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted));

    let kinds = harness.events.kinds_for(&session.id);
    assert_eq!(
        kinds,
        vec![EventKind::Booked, EventKind::Started, EventKind::Completed]
    );
    Ok(())
}

#[tokio::test]
async fn test_expired_access_evicts_live_state() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;
    harness
        .conversations
        .initialize(&session.id, "cand-1", Some(questions(2)))
        .await?;

    harness.move_to(&session, Duration::minutes(90));
    let err = harness
        .sessions
        .check_access(&session.id, &session.token, "cand-1")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Expired));
    assert_eq!(harness.registry.stats().await.conversations, 0);
    Ok(())
}

#[tokio::test]
async fn test_no_show_is_terminal() -> Result<()> {
    let harness = Harness::new()?;
    let session = harness.book_tuesday("cand-1", "10:00").await?;

    let no_show = harness.sessions.no_show(&session.id).await?;
    assert_eq!(no_show.status, SessionStatus::NoShow);

    assert!(matches!(
        harness.sessions.confirm(&session.id).await,
        Err(EngineError::InvalidState(_))
    ));
    assert!(matches!(
        harness.sessions.get("INT-0-00000000").await,
        Err(EngineError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_reminders_are_sent_once() -> Result<()> {
    let harness = Harness::new()?;
    let soon = harness.book_tuesday("cand-1", "10:00").await?;
    let later = harness
        .sessions
        .book(booking("cand-2", "job-1", "2026-03-05", "10:00"))
        .await?;

    let sent = harness.sessions.send_due_reminders(Duration::hours(30)).await?;
    assert_eq!(sent, 1);

    let reminded = harness.sessions.get(&soon.id).await?;
    assert!(reminded.reminder_sent);
    assert!(reminded
        .notifications
        .iter()
        .any(|n| n.kind == NotificationKind::Reminder));
    assert!(!harness.sessions.get(&later.id).await?.reminder_sent);

    let again = harness.sessions.send_due_reminders(Duration::hours(30)).await?;
    assert_eq!(again, 0);
    Ok(())
}

#[tokio::test]
async fn test_file_store_survives_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("sessions.json");

    let id = {
        let store = Arc::new(LocalStore::open(path.clone()).await?);
        let harness = Harness::with_store(store)?;
        let session = harness.book_tuesday("cand-1", "10:00").await?;
        harness.sessions.confirm(&session.id).await?;
        session.id
    };

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());

    let reopened = LocalStore::open(path.clone()).await?;
    let session = reopened.get(&id).await?.expect("session persisted");
    assert_eq!(session.status, SessionStatus::Confirmed);

    let harness = Harness::with_store(Arc::new(reopened))?;
    let err = harness.book_tuesday("cand-2", "10:00").await.unwrap_err();
    assert!(matches!(
        err.downcast::<EngineError>()?,
        EngineError::Conflict { .. }
    ));
    Ok(())
}
