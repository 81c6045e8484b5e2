use super::ids;
use super::model::{
    CandidateProfile, ConfirmationStatus, InterviewSession, NotificationKind, RescheduleRequest,
    RescheduleState, ScheduledSlot, SessionStatus,
};
use super::store::{SessionQuery, SessionStore};
use crate::access::{AccessDenied, AccessGrant, AccessPolicy};
use crate::clock::{Clock, TimeWindow};
use crate::config::Config;
use crate::conversation::AnswerRecord;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventKind, EventPublisher, SessionEventMessage};
use crate::registry::{SessionKey, SessionRegistry};
use crate::scheduling::{AvailabilityEngine, DayAvailability, SlotCatalog};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Request to book an interview at a catalog slot
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub candidate: CandidateProfile,
    pub job_id: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub application_id: Option<String>,
    /// "YYYY-MM-DD" on the catalog wall clock
    pub date: String,
    /// "HH:MM", one of the catalog times
    pub time: String,
    #[serde(default)]
    pub demo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotRequest {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleInput {
    pub date: String,
    pub time: String,
    pub reason: String,
}

struct BookingSettings {
    public_base_url: String,
    interviewer_type: String,
    lookahead_days: u32,
    demo_prefixes: Vec<String>,
}

/// Durable interview lifecycle: booking, confirmation, rescheduling, joining
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    availability: AvailabilityEngine,
    access: AccessPolicy,
    registry: Arc<SessionRegistry>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    settings: BookingSettings,
}

impl SessionService {
    pub fn new(
        config: &Config,
        store: Arc<dyn SessionStore>,
        registry: Arc<SessionRegistry>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        Ok(Self {
            store,
            availability: AvailabilityEngine::from_config(&config.scheduling)?,
            access: AccessPolicy::from_config(&config.access),
            registry,
            events,
            clock,
            settings: BookingSettings {
                public_base_url: config.service.public_base_url.clone(),
                interviewer_type: config.scheduling.interviewer_type.clone(),
                lookahead_days: config.scheduling.lookahead_days,
                demo_prefixes: config.recording.demo_id_prefixes.clone(),
            },
        })
    }

    pub fn availability(&self) -> &AvailabilityEngine {
        &self.availability
    }

    pub fn access_policy(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn get(&self, id: &str) -> EngineResult<InterviewSession> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Interview {} not found", id)))
    }

    async fn booked_windows(&self, window: TimeWindow, exclude_id: Option<String>) -> EngineResult<Vec<TimeWindow>> {
        let sessions = self
            .store
            .query(SessionQuery::blocking_in(window).excluding(exclude_id))
            .await?;
        Ok(sessions.iter().map(|s| s.window()).collect())
    }

    /// Availability for one wall-clock day
    pub async fn day_availability(
        &self,
        date: NaiveDate,
        exclude_id: Option<String>,
    ) -> EngineResult<DayAvailability> {
        let now = self.clock.now();
        let booked = self
            .booked_windows(self.availability.day_window(date), exclude_id)
            .await?;
        Ok(self.availability.day(date, &booked, now))
    }

    /// Availability for the next `days` days, starting tomorrow
    pub async fn upcoming_availability(
        &self,
        days: Option<u32>,
        exclude_id: Option<String>,
    ) -> EngineResult<BTreeMap<NaiveDate, DayAvailability>> {
        let now = self.clock.now();
        let days = days.unwrap_or(self.settings.lookahead_days).clamp(1, 60);
        let first = self
            .availability
            .catalog()
            .local_date(now)
            .succ_opt()
            .ok_or_else(|| EngineError::Validation("date out of range".to_string()))?;

        let booked = self
            .booked_windows(self.availability.range_window(first, days), exclude_id)
            .await?;
        Ok(self.availability.days(first, days, &booked, now))
    }

    fn requested_window(&self, date: &str, time: &str, now: DateTime<Utc>) -> EngineResult<TimeWindow> {
        let date = SlotCatalog::parse_date(date)?;
        let time = SlotCatalog::parse_time(time)?;
        self.availability.requested_window(date, time, now)
    }

    /// Book an interview with a single reserve-if-free step
    pub async fn book(&self, request: BookingRequest) -> EngineResult<InterviewSession> {
        validate_booking(&request)?;

        let now = self.clock.now();
        let window = self.requested_window(&request.date, &request.time, now)?;

        let mut id = ids::session_id(now);
        if request.demo {
            let prefix = self
                .settings
                .demo_prefixes
                .first()
                .map(String::as_str)
                .unwrap_or("TEST-");
            id = format!("{}{}", prefix, id);
        }

        let token = ids::access_token();
        let mut session = InterviewSession {
            link: ids::join_link(&self.settings.public_base_url, &id, &token, &request.candidate.id),
            channel: ids::channel_name(&id),
            demo: ids::is_demo_id(&id, &self.settings.demo_prefixes),
            id,
            token,
            candidate: request.candidate,
            job_id: request.job_id,
            job_title: request.job_title,
            application_id: request.application_id,
            slot: ScheduledSlot {
                starts_at: window.start,
                duration_minutes: self.availability.catalog().duration_minutes(),
                interviewer_type: self.settings.interviewer_type.clone(),
            },
            status: SessionStatus::Scheduled,
            confirmation: ConfirmationStatus::Pending,
            reschedule_requests: Vec::new(),
            notifications: Vec::new(),
            reminder_sent: false,
            recording: None,
            answers: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        session.notify(NotificationKind::Scheduled, now);

        let session = match self.store.reserve(session).await {
            Ok(session) => session,
            Err(e) => {
                warn!(code = e.code(), "Booking rejected: {}", e);
                return Err(e);
            }
        };

        info!(
            session_id = %session.id,
            candidate_id = %session.candidate.id,
            starts_at = %session.slot.starts_at,
            demo = session.demo,
            "Interview booked"
        );
        self.announce(
            SessionEventMessage::new(EventKind::Booked, &session.id, now)
                .with_status(session.status.as_str())
                .with_detail(serde_json::json!({
                    "candidate_id": session.candidate.id,
                    "job_id": session.job_id,
                    "starts_at": session.slot.starts_at,
                })),
        )
        .await;

        Ok(session)
    }

    pub async fn confirm(&self, id: &str) -> EngineResult<InterviewSession> {
        let now = self.clock.now();
        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    s.transition(SessionStatus::Confirmed)?;
                    s.confirmation = ConfirmationStatus::Confirmed;
                    s.notify(NotificationKind::Confirmation, now);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        info!(session_id = %id, "Interview confirmed");
        self.announce_status(EventKind::Confirmed, &session, now).await;
        Ok(session)
    }

    /// Log a reschedule request without moving the slot
    pub async fn request_reschedule(
        &self,
        id: &str,
        input: RescheduleInput,
    ) -> EngineResult<InterviewSession> {
        let reason = input.reason.trim().to_string();
        if reason.is_empty() {
            return Err(EngineError::Validation(
                "A reason is required for rescheduling".to_string(),
            ));
        }

        let now = self.clock.now();
        let requested = self.requested_window(&input.date, &input.time, now)?;

        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    if !s.status.can_transition_to(SessionStatus::Rescheduled) {
                        return Err(EngineError::InvalidState(format!(
                            "interview {} cannot be rescheduled while {}",
                            s.id,
                            s.status.as_str()
                        )));
                    }

                    s.reschedule_requests.push(RescheduleRequest {
                        requested_start: requested.start,
                        reason,
                        status: RescheduleState::Pending,
                        requested_at: now,
                    });
                    s.confirmation = ConfirmationStatus::Rescheduled;
                    s.notify(NotificationKind::Reschedule, now);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        info!(session_id = %id, requested_start = %requested.start, "Reschedule requested");
        self.announce(
            SessionEventMessage::new(EventKind::RescheduleRequested, id, now)
                .with_detail(serde_json::json!({ "requested_start": requested.start })),
        )
        .await;
        Ok(session)
    }

    /// Move the session to a new slot; the store re-checks the slot atomically
    pub async fn apply_reschedule(&self, id: &str, slot: SlotRequest) -> EngineResult<InterviewSession> {
        let now = self.clock.now();
        let window = self.requested_window(&slot.date, &slot.time, now)?;

        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    s.transition(SessionStatus::Rescheduled)?;
                    s.slot.starts_at = window.start;
                    if let Some(request) = s.pending_reschedule() {
                        request.status = RescheduleState::Approved;
                    }
                    s.confirmation = ConfirmationStatus::Pending;
                    s.reminder_sent = false;
                    s.notify(NotificationKind::Reschedule, now);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        info!(session_id = %id, starts_at = %window.start, "Interview rescheduled");
        self.announce_status(EventKind::Rescheduled, &session, now).await;
        Ok(session)
    }

    pub async fn cancel(&self, id: &str) -> EngineResult<InterviewSession> {
        let now = self.clock.now();
        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    s.transition(SessionStatus::Cancelled)?;
                    s.confirmation = ConfirmationStatus::Declined;
                    s.notify(NotificationKind::Cancellation, now);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        self.registry.evict_session(id).await;
        info!(session_id = %id, "Interview cancelled");
        self.announce_status(EventKind::Cancelled, &session, now).await;
        Ok(session)
    }

    pub async fn no_show(&self, id: &str) -> EngineResult<InterviewSession> {
        let now = self.clock.now();
        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    s.transition(SessionStatus::NoShow)?;
                    s.notify(NotificationKind::NoShow, now);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        self.registry.evict_session(id).await;
        info!(session_id = %id, "Interview marked as no-show");
        self.announce_status(EventKind::NoShow, &session, now).await;
        Ok(session)
    }

    /// Validate a join attempt. Dead sessions lose their live state here.
    pub async fn check_access(
        &self,
        id: &str,
        token: &str,
        participant_id: &str,
    ) -> EngineResult<AccessGrant> {
        let now = self.clock.now();
        let session = self.store.get(id).await?;

        match self.access.validate(session.as_ref(), token, participant_id, now) {
            Ok(grant) => Ok(grant),
            Err(denied) => {
                if matches!(denied, AccessDenied::Expired | AccessDenied::Cancelled) {
                    self.registry.evict_session(id).await;
                }
                warn!(session_id = %id, participant_id = %participant_id, "Join rejected: {:?}", denied);
                Err(denied.into())
            }
        }
    }

    /// Validate and move the session to `in_progress`; repeat calls are no-ops
    pub async fn begin(
        &self,
        id: &str,
        token: &str,
        participant_id: &str,
    ) -> EngineResult<InterviewSession> {
        self.check_access(id, token, participant_id).await?;

        let current = self.get(id).await?;
        if current.status == SessionStatus::InProgress {
            return Ok(current);
        }

        let now = self.clock.now();
        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    if s.status != SessionStatus::InProgress {
                        s.transition(SessionStatus::InProgress)?;
                        s.updated_at = now;
                    }
                    Ok(())
                }),
            )
            .await?;

        info!(session_id = %id, participant_id = %participant_id, "Interview started");
        self.announce_status(EventKind::Started, &session, now).await;
        Ok(session)
    }

    pub async fn complete(
        &self,
        id: &str,
        token: &str,
        participant_id: &str,
    ) -> EngineResult<InterviewSession> {
        self.check_access(id, token, participant_id).await?;

        let now = self.clock.now();
        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    s.transition(SessionStatus::Completed)?;
                    s.notify(NotificationKind::Completion, now);
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        self.registry
            .remove_conversation(&SessionKey::new(id, participant_id))
            .await;
        info!(session_id = %id, "Interview completed");
        self.announce_status(EventKind::Completed, &session, now).await;
        Ok(session)
    }

    /// Store the finished answer log for grading
    pub async fn record_answers(&self, id: &str, answers: Vec<AnswerRecord>) -> EngineResult<InterviewSession> {
        let now = self.clock.now();
        let count = answers.len();
        let session = self
            .store
            .modify(
                id,
                Box::new(move |s| {
                    s.answers = answers;
                    s.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        info!(session_id = %id, answers = count, "Answer log recorded");
        self.announce(
            SessionEventMessage::new(EventKind::ConversationCompleted, id, now)
                .with_detail(serde_json::json!({ "answers": count })),
        )
        .await;
        Ok(session)
    }

    /// Flag every blocking session starting within `lookahead` that has not been reminded
    pub async fn send_due_reminders(&self, lookahead: Duration) -> EngineResult<usize> {
        let now = self.clock.now();
        let due = self
            .store
            .query(SessionQuery {
                window: Some(TimeWindow::new(now, now + lookahead)),
                statuses: Some(vec![
                    SessionStatus::Scheduled,
                    SessionStatus::Confirmed,
                    SessionStatus::Rescheduled,
                ]),
                exclude_id: None,
            })
            .await?;

        let mut sent = 0;
        for session in due
            .into_iter()
            .filter(|s| !s.reminder_sent && s.slot.starts_at > now)
        {
            let result = self
                .store
                .modify(
                    &session.id,
                    Box::new(move |s| {
                        if s.reminder_sent {
                            return Err(EngineError::InvalidState("reminder already sent".to_string()));
                        }
                        s.reminder_sent = true;
                        s.notify(NotificationKind::Reminder, now);
                        s.updated_at = now;
                        Ok(())
                    }),
                )
                .await;

            match result {
                Ok(updated) => {
                    sent += 1;
                    self.announce(
                        SessionEventMessage::new(EventKind::Reminder, &updated.id, now).with_detail(
                            serde_json::json!({
                                "candidate_id": updated.candidate.id,
                                "starts_at": updated.slot.starts_at,
                            }),
                        ),
                    )
                    .await;
                }
                Err(EngineError::InvalidState(_)) => {}
                Err(e) => warn!(session_id = %session.id, "Failed to record reminder: {}", e),
            }
        }

        if sent > 0 {
            info!(sent, "Interview reminders sent");
        }
        Ok(sent)
    }

    async fn announce_status(&self, kind: EventKind, session: &InterviewSession, now: DateTime<Utc>) {
        self.announce(SessionEventMessage::new(kind, &session.id, now).with_status(session.status.as_str()))
            .await;
    }

    async fn announce(&self, event: SessionEventMessage) {
        let subject = event.subject();
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish {}: {:#}", subject, e);
        }
    }
}

fn validate_booking(request: &BookingRequest) -> EngineResult<()> {
    if request.candidate.id.trim().is_empty() {
        return Err(EngineError::Validation("Candidate id is required".to_string()));
    }
    if request.candidate.name.trim().is_empty() {
        return Err(EngineError::Validation("Candidate name is required".to_string()));
    }
    if !is_plausible_email(&request.candidate.email) {
        return Err(EngineError::Validation(format!(
            "Invalid email address: {}",
            request.candidate.email
        )));
    }
    if request.job_id.trim().is_empty() {
        return Err(EngineError::Validation("Job reference is required".to_string()));
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace
fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}
