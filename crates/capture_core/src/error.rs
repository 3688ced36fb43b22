use shared::{error::InvalidOption, protocol::JobPhase};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    InvalidOption(#[from] InvalidOption),
    #[error("error creating session: {0}")]
    SessionCreation(String),
    #[error("process got error: {0}")]
    Submission(String),
    #[error("event stream failed: {0}")]
    EventStream(String),
    #[error("{0}")]
    Request(String),
    #[error("unhandled event: {0}")]
    UnhandledEvent(String),
    #[error("a reconstruction job is already running")]
    Busy,
    #[error("status must be acknowledged before starting a new job (currently {0:?})")]
    NotReady(JobPhase),
    #[error("a request was already submitted for this job")]
    AlreadySubmitted,
    #[error("no request was submitted for this job")]
    NotSubmitted,
}

impl JobError {
    /// Whether this error ends the job it belongs to, as opposed to being
    /// rejected before any job state changed.
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            JobError::SessionCreation(_)
                | JobError::Submission(_)
                | JobError::EventStream(_)
                | JobError::Request(_)
                | JobError::UnhandledEvent(_)
        )
    }
}

/// Renders an engine error with its context chain, the way it is shown to users.
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
