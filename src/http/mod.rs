//! HTTP API for the interview engine
//!
//! - GET /health - Health check
//! - GET /slots/day, GET /slots - Slot availability
//! - POST /interviews, GET /interviews/:id - Booking and lookup
//! - POST /interviews/:id/{confirm,reschedule-request,reschedule,cancel,no-show}
//! - GET /interviews/:id/access, POST /interviews/:id/join - Join validation
//! - POST /interviews/:id/conversation - Conversation steps
//! - POST /interviews/:id/recording/{start,stop}, GET /interviews/:id/recording

mod handlers;
mod routes;
mod state;

pub use handlers::{BookingResponse, SessionView};
pub use routes::create_router;
pub use state::AppState;
