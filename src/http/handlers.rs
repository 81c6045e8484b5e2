use super::state::AppState;
use crate::access::AccessGrant;
use crate::conversation::Question;
use crate::error::EngineError;
use crate::recording::RecordingStatus;
use crate::scheduling::SlotCatalog;
use crate::session::{
    BookingRequest, CandidateProfile, ConfirmationStatus, InterviewSession, NotificationRecord,
    RescheduleInput, RescheduleRequest, ScheduledSlot, SessionStatus, SlotRequest,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Interview record as exposed over HTTP; never carries the access token
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub candidate: CandidateProfile,
    pub job_id: String,
    pub job_title: String,
    pub application_id: Option<String>,
    pub slot: ScheduledSlot,
    pub channel: String,
    pub status: SessionStatus,
    pub confirmation: ConfirmationStatus,
    pub reschedule_requests: Vec<RescheduleRequest>,
    pub notifications: Vec<NotificationRecord>,
    pub reminder_sent: bool,
    pub demo: bool,
    pub recording_status: Option<RecordingStatus>,
    pub answers_recorded: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<InterviewSession> for SessionView {
    fn from(session: InterviewSession) -> Self {
        Self {
            recording_status: session.recording.as_ref().map(|r| r.status),
            answers_recorded: session.answers.len(),
            id: session.id,
            candidate: session.candidate,
            job_id: session.job_id,
            job_title: session.job_title,
            application_id: session.application_id,
            slot: session.slot,
            channel: session.channel,
            status: session.status,
            confirmation: session.confirmation,
            reschedule_requests: session.reschedule_requests,
            notifications: session.notifications,
            reminder_sent: session.reminder_sent,
            demo: session.demo,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Returned once, at booking: the join link embeds the secret token
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub link: String,
    pub session: SessionView,
}

#[derive(Debug, Deserialize)]
pub struct DaySlotsQuery {
    pub date: String,
    pub exclude_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingSlotsQuery {
    pub days: Option<u32>,
    pub exclude_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub token: String,
    pub participant: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAction {
    #[default]
    Begin,
    Complete,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub token: String,
    pub participant: String,
    #[serde(default)]
    pub action: JoinAction,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub session: SessionView,
    /// Absent once the interview is completed
    pub access: Option<AccessGrant>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConversationAction {
    Initialize {
        #[serde(default)]
        questions: Option<Vec<Question>>,
    },
    Respond {
        answer: String,
        #[serde(default)]
        expected_index: Option<usize>,
    },
    Repeat,
    Status,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    pub token: String,
    pub participant: String,
    #[serde(flatten)]
    pub action: ConversationAction,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint, with live registry counts
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let live = state.registry.stats().await;
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "live": live })),
    )
}

/// GET /slots/day?date=YYYY-MM-DD&exclude_id=
/// Availability of every catalog time on one day
pub async fn day_slots(
    State(state): State<AppState>,
    Query(query): Query<DaySlotsQuery>,
) -> Result<Response, EngineError> {
    let date = SlotCatalog::parse_date(&query.date)?;
    let day = state.sessions.day_availability(date, query.exclude_id).await?;
    Ok((StatusCode::OK, Json(day)).into_response())
}

/// GET /slots?days=N&exclude_id=
/// Availability for the coming days, grouped by date
pub async fn upcoming_slots(
    State(state): State<AppState>,
    Query(query): Query<UpcomingSlotsQuery>,
) -> Result<Response, EngineError> {
    let days = state
        .sessions
        .upcoming_availability(query.days, query.exclude_id)
        .await?;
    Ok((StatusCode::OK, Json(days)).into_response())
}

/// POST /interviews
/// Book an interview slot
pub async fn book_interview(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<Response, EngineError> {
    info!("Booking interview for candidate: {}", req.candidate.id);

    let session = state.sessions.book(req).await?;
    let link = session.link.clone();

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            link,
            session: session.into(),
        }),
    )
        .into_response())
}

/// GET /interviews/:id
pub async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    let session = state.sessions.get(&id).await?;
    Ok((StatusCode::OK, Json(SessionView::from(session))).into_response())
}

/// POST /interviews/:id/confirm
pub async fn confirm_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    let session = state.sessions.confirm(&id).await?;
    Ok((StatusCode::OK, Json(SessionView::from(session))).into_response())
}

/// POST /interviews/:id/reschedule-request
/// Log a reschedule request; the slot does not move
pub async fn request_reschedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RescheduleInput>,
) -> Result<Response, EngineError> {
    let session = state.sessions.request_reschedule(&id, req).await?;
    Ok((StatusCode::OK, Json(SessionView::from(session))).into_response())
}

/// POST /interviews/:id/reschedule
/// Move the interview to a new slot
pub async fn apply_reschedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SlotRequest>,
) -> Result<Response, EngineError> {
    let session = state.sessions.apply_reschedule(&id, req).await?;
    Ok((StatusCode::OK, Json(SessionView::from(session))).into_response())
}

/// POST /interviews/:id/cancel
pub async fn cancel_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    let session = state.sessions.cancel(&id).await?;
    Ok((StatusCode::OK, Json(SessionView::from(session))).into_response())
}

/// POST /interviews/:id/no-show
pub async fn mark_no_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    let session = state.sessions.no_show(&id).await?;
    Ok((StatusCode::OK, Json(SessionView::from(session))).into_response())
}

/// GET /interviews/:id/access?token=&participant=
/// Validate a join link without changing anything
pub async fn check_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Response, EngineError> {
    let grant = state
        .sessions
        .check_access(&id, &query.token, &query.participant)
        .await?;
    Ok((StatusCode::OK, Json(grant)).into_response())
}

/// POST /interviews/:id/join
/// Begin or complete the interview
pub async fn join_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Response, EngineError> {
    let (session, access) = match req.action {
        JoinAction::Begin => {
            let session = state.sessions.begin(&id, &req.token, &req.participant).await?;
            let access = state
                .sessions
                .check_access(&id, &req.token, &req.participant)
                .await?;
            (session, Some(access))
        }
        JoinAction::Complete => {
            let session = state
                .sessions
                .complete(&id, &req.token, &req.participant)
                .await?;
            (session, None)
        }
    };

    Ok((
        StatusCode::OK,
        Json(JoinResponse {
            session: session.into(),
            access,
        }),
    )
        .into_response())
}

/// POST /interviews/:id/conversation
/// One conversation step: initialize, respond, repeat or status
pub async fn conversation_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ConversationRequest>,
) -> Result<Response, EngineError> {
    state
        .sessions
        .check_access(&id, &req.token, &req.participant)
        .await?;

    let conversations = &state.conversations;
    let response = match req.action {
        ConversationAction::Initialize { questions } => {
            let turn = conversations
                .initialize(&id, &req.participant, questions)
                .await?;
            (StatusCode::OK, Json(turn)).into_response()
        }
        ConversationAction::Respond {
            answer,
            expected_index,
        } => {
            let turn = conversations
                .respond(&id, &req.participant, &answer, expected_index)
                .await?;
            (StatusCode::OK, Json(turn)).into_response()
        }
        ConversationAction::Repeat => {
            let turn = conversations.repeat(&id, &req.participant).await?;
            (StatusCode::OK, Json(turn)).into_response()
        }
        ConversationAction::Status => {
            let status = conversations.status(&id, &req.participant).await?;
            (StatusCode::OK, Json(status)).into_response()
        }
    };

    Ok(response)
}

/// POST /interviews/:id/recording/start
pub async fn start_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    info!("Starting recording for interview: {}", id);

    let ack = state.recordings.start(&id).await?;
    Ok((StatusCode::OK, Json(ack)).into_response())
}

/// POST /interviews/:id/recording/stop
/// Acknowledges the stop; the upload finishes in the background
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    info!("Stopping recording for interview: {}", id);

    let ack = state.recordings.stop(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(ack)).into_response())
}

/// GET /interviews/:id/recording
pub async fn recording_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, EngineError> {
    let view = state.recordings.status(&id).await?;
    Ok((StatusCode::OK, Json(view)).into_response())
}
