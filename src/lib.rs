pub mod access;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod http;
pub mod recording;
pub mod registry;
pub mod scheduling;
pub mod session;
pub mod tasks;

pub use access::{AccessDenied, AccessGrant, AccessPolicy, AccessVerdict};
pub use clock::{Clock, FixedClock, SystemClock, TimeWindow};
pub use config::Config;
pub use conversation::{
    AnswerRecord, ConversationMachine, ConversationService, Phase, Progress, Question,
    QuestionSource, StaticQuestionSource, Turn, TurnAction,
};
pub use error::{EngineError, EngineResult};
pub use events::{EventKind, EventPublisher, LogPublisher, NatsPublisher, SessionEventMessage};
pub use http::{create_router, AppState};
pub use recording::{
    ArtifactDescriptor, CaptureProvider, HttpCaptureProvider, LocalObjectStorage, ObjectStorage,
    RecordingManager, RecordingState, RecordingStatus, UploadJob, UploadQueue, UploadWorker,
};
pub use registry::{SessionKey, SessionRegistry};
pub use scheduling::{AvailabilityEngine, DayAvailability, SlotCatalog};
pub use session::{
    BookingRequest, CandidateProfile, InterviewSession, LocalStore, SessionService, SessionStatus,
    SessionStore,
};
