//! Turn-taking between the user and the reply service.

pub mod engine;
pub mod pacing;
pub mod state;

pub use engine::{DispatchEngine, Disposition, EngineEvent, Submission};
pub use pacing::{Pacer, RecordingPacer, TokioPacer};
pub use state::{DispatchEffect, DispatchEvent, DispatchState, PendingMessage, Phase, SubmissionId};
