pub mod extraction;
pub mod validation;
pub mod storage;
pub mod anchor;
pub mod locks;
pub mod processor; // Verification orchestrator
pub mod queue;
pub mod retry;

pub use processor::{
    PipelineServices, PipelineSettings, ProcessingError, SubmitError, VerificationOrchestrator,
};
pub use queue::{job_channel, spawn_dispatcher, DispatcherHandle, JobReceiver, JobSender};
pub use retry::{RetryController, RetryError, RetryOutcome};
