use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const UNKNOWN_FAILURE: &str = "unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Waiting,
    Working,
    Success,
    Failed,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobPhase::Success | JobPhase::Failed | JobPhase::Cancelled
        )
    }
}

/// Externally observed state of the current job.
///
/// `error_message` is `Some` exactly when `phase` is `Failed`; the transition
/// methods below keep that invariant and never leave a terminal phase except
/// through [`JobStatus::acknowledge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobStatus {
    pub phase: JobPhase,
    pub progress_fraction: f64,
    pub error_message: Option<String>,
    pub output: Option<PathBuf>,
}

impl JobStatus {
    pub fn waiting() -> Self {
        Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn begin_work(&mut self) -> bool {
        if self.phase != JobPhase::Waiting {
            return false;
        }
        self.phase = JobPhase::Working;
        self.progress_fraction = 0.0;
        true
    }

    /// Moves to `Working` if needed and raises the progress fraction. Lower,
    /// NaN, or post-terminal fractions are ignored.
    pub fn record_progress(&mut self, fraction: f64) -> bool {
        if self.is_terminal() || fraction.is_nan() {
            return false;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        let mut changed = self.begin_work();
        if fraction > self.progress_fraction {
            self.progress_fraction = fraction;
            changed = true;
        }
        changed
    }

    pub fn succeed(&mut self, output: Option<PathBuf>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.phase = JobPhase::Success;
        self.error_message = None;
        self.output = output;
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let message = message.into();
        self.phase = JobPhase::Failed;
        self.error_message = Some(if message.trim().is_empty() {
            UNKNOWN_FAILURE.to_string()
        } else {
            message
        });
        true
    }

    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.phase = JobPhase::Cancelled;
        self.error_message = None;
        true
    }

    /// Returns a terminal status to `Waiting`. No-op for live phases.
    pub fn acknowledge(&mut self) -> bool {
        if !self.is_terminal() {
            return false;
        }
        *self = Self::waiting();
        true
    }
}

pub type SampleId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionResult {
    ModelFile(PathBuf),
    /// A result kind this front-end does not know how to present.
    Unexpected(String),
}

/// Notifications emitted by an engine session, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RequestProgress { fraction: f64 },
    ProcessingComplete,
    InputComplete,
    RequestComplete { result: ReconstructionResult },
    RequestError { error: String },
    InvalidSample { id: SampleId, reason: String },
    SkippedSample { id: SampleId },
    AutomaticDownsampling,
    ProcessingCancelled,
    /// A variant this build does not recognise. Never ignored.
    Unrecognized { kind: String },
}

impl EngineEvent {
    pub fn kind(&self) -> &str {
        match self {
            EngineEvent::RequestProgress { .. } => "progress",
            EngineEvent::ProcessingComplete => "processing_complete",
            EngineEvent::InputComplete => "input_complete",
            EngineEvent::RequestComplete { .. } => "request_complete",
            EngineEvent::RequestError { .. } => "request_error",
            EngineEvent::InvalidSample { .. } => "invalid_sample",
            EngineEvent::SkippedSample { .. } => "skipped_sample",
            EngineEvent::AutomaticDownsampling => "automatic_downsampling",
            EngineEvent::ProcessingCancelled => "processing_cancelled",
            EngineEvent::Unrecognized { kind } => kind,
        }
    }
}
