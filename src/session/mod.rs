//! Durable interview sessions
//!
//! This module provides the interview record and everything that changes it:
//! - `InterviewSession` and its status graph
//! - id, token, link and channel derivation
//! - `SessionStore` with the atomic reserve-if-free booking step
//! - `SessionService` for booking, confirmation, rescheduling and joining

pub mod ids;
mod model;
mod service;
mod store;

pub use model::{
    CandidateProfile, ConfirmationStatus, InterviewSession, NotificationChannel, NotificationKind,
    NotificationRecord, RescheduleRequest, RescheduleState, ScheduledSlot, SessionStatus,
};
pub use service::{BookingRequest, RescheduleInput, SessionService, SlotRequest};
pub use store::{LocalStore, SessionQuery, SessionStore, SessionUpdate};
