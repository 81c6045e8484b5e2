//! Background tasks
//!
//! Each task loops on its interval until the shared cancellation token fires:
//! - `registry_sweeper`: evicts idle live session state
//! - `reminders`: flags and announces interviews starting soon

pub mod registry_sweeper;
pub mod reminders;

pub use registry_sweeper::start_registry_sweeper;
pub use reminders::start_reminders;
