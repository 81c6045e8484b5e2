use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Slot availability
        .route("/slots/day", get(handlers::day_slots))
        .route("/slots", get(handlers::upcoming_slots))
        // Booking and lifecycle
        .route("/interviews", post(handlers::book_interview))
        .route("/interviews/:id", get(handlers::get_interview))
        .route("/interviews/:id/confirm", post(handlers::confirm_interview))
        .route(
            "/interviews/:id/reschedule-request",
            post(handlers::request_reschedule),
        )
        .route("/interviews/:id/reschedule", post(handlers::apply_reschedule))
        .route("/interviews/:id/cancel", post(handlers::cancel_interview))
        .route("/interviews/:id/no-show", post(handlers::mark_no_show))
        // Joining
        .route("/interviews/:id/access", get(handlers::check_access))
        .route("/interviews/:id/join", post(handlers::join_interview))
        // Conversation
        .route("/interviews/:id/conversation", post(handlers::conversation_step))
        // Recording control
        .route("/interviews/:id/recording", get(handlers::recording_status))
        .route("/interviews/:id/recording/start", post(handlers::start_recording))
        .route("/interviews/:id/recording/stop", post(handlers::stop_recording))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
