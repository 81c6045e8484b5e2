//! Recorded session lifecycle
//!
//! This module provides everything between "start recording" and a durable
//! artifact link:
//! - `RecordingState`: the closed acquire/record/stop/upload state machine
//! - `CaptureProvider` / `ObjectStorage`: provider seams with HTTP and
//!   local-filesystem implementations
//! - `RecordingManager`: start/stop/status control
//! - `UploadQueue`: persisted, retried background upload

mod manager;
mod provider;
mod state;
mod upload;

pub use manager::{RecordingAck, RecordingManager, RecordingView};
pub use provider::{CaptureProvider, HttpCaptureProvider, LocalObjectStorage, ObjectStorage};
pub use state::{ArtifactDescriptor, RecordingState, RecordingStatus};
pub use upload::{
    upload_backoff_ms, UploadJob, UploadJobStatus, UploadQueue, UploadSettings, UploadWorker,
};
