//! Orchestration of photogrammetry jobs: option validation, the job
//! controller, the event reducer and the observable status cell.

pub mod controller;
pub mod error;
pub mod options;
mod reducer;
pub mod settings;
mod status;

pub use controller::{ControllerOptions, Job, JobController, DEFAULT_DRAIN_TIMEOUT};
pub use error::JobError;
pub use options::{JobOptions, RawJobOptions};
pub use reducer::reduce_event;
pub use settings::{load_settings, Settings};
pub use status::StatusObserver;
