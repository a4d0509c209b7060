//! The Session Supervisor and Job Service (spec §4.9-§4.10), orchestrating the
//! conversation, routing, scheduling and storage crates into one session lifecycle.

pub mod error;
pub mod jobs;
pub mod supervisor;

pub mod prelude {
    pub use crate::error::{Result, SessionError};
    pub use crate::jobs::{JobDraft, JobService, NotificationSink};
    pub use crate::supervisor::{Channel, SessionDescriptor, SessionSummary, Supervisor};
}

