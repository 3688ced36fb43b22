//! UI/backend events and error modeling for desktop GUI controller.

use capture_core::StatusObserver;
use shared::domain::Detail;

pub enum UiEvent {
    BackendReady {
        status: StatusObserver,
        default_detail: Option<Detail>,
    },
    Info(String),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Input,
    Engine,
    Busy,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    StartJob,
    Reconstruction,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("already running")
            || message_lower.contains("must be acknowledged")
            || message_lower.contains("queue is full")
        {
            UiErrorCategory::Busy
        } else if message_lower.contains("invalid")
            || message_lower.contains("not accessible")
            || message_lower.contains("not a folder")
            || message_lower.contains("cannot be read")
        {
            UiErrorCategory::Input
        } else if message_lower.contains("engine")
            || message_lower.contains("launch")
            || message_lower.contains("event stream")
            || message_lower.contains("disconnected")
        {
            UiErrorCategory::Engine
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    /// Whether picking different folders or options could fix the error.
    pub fn is_input_problem(&self) -> bool {
        self.category == UiErrorCategory::Input
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn title(&self) -> &'static str {
        match self.context {
            UiErrorContext::BackendStartup => "Backend unavailable",
            UiErrorContext::StartJob => "Could not start reconstruction",
            UiErrorContext::Reconstruction => "Reconstruction failed",
            UiErrorContext::General => "Error",
        }
    }
}
