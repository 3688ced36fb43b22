//! Seam between the job orchestration layer and a reconstruction engine.
//!
//! The engine is consumed, not implemented: [`ReconstructionEngine`] opens a
//! session over one input directory, [`EngineSession`] accepts the requests
//! and hands out the ordered event stream for that session.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::{
    domain::{ReconstructionConfiguration, ReconstructionRequest},
    protocol::EngineEvent,
};

pub mod command;
pub mod wire;

pub use command::{CommandEngine, CommandEngineOptions};

/// Ordered engine events. An `Err` item ends the sequence.
pub type EventStream = BoxStream<'static, anyhow::Result<EngineEvent>>;

#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Hands the requests to the engine. Returns once the engine has accepted
    /// them, not when they complete.
    async fn process(&self, requests: &[ReconstructionRequest]) -> anyhow::Result<()>;

    /// The session's event sequence. Available once per session.
    fn outputs(&self) -> anyhow::Result<EventStream>;
}

#[async_trait]
pub trait ReconstructionEngine: Send + Sync {
    async fn create_session(
        &self,
        input_dir: &Path,
        configuration: &ReconstructionConfiguration,
    ) -> anyhow::Result<Box<dyn EngineSession>>;
}
