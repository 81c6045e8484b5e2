//! Lifecycle events
//!
//! Booking, status and recording transitions are announced as JSON messages
//! on `interview.{kind}.{session_id}`:
//! - `NatsPublisher`: publishes to a NATS server
//! - `LogPublisher`: logs the event when no broker is configured

mod messages;
mod publisher;

pub use messages::{EventKind, SessionEventMessage};
pub use publisher::{EventPublisher, LogPublisher, NatsPublisher};
