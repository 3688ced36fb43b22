//! Folds a session's event sequence into [`JobStatus`] updates.

use engine_bridge::EventStream;
use futures::StreamExt;
use shared::{
    domain::{JobId, ReconstructionRequest},
    protocol::{EngineEvent, JobStatus, ReconstructionResult},
};
use tracing::{debug, error, info, warn};

use crate::{
    error::{describe, JobError},
    status::StatusWriter,
};

pub(crate) const STREAM_ENDED_EARLY: &str = "event stream ended before the request completed";

/// Applies one event to `status`. Returns whether anything changed.
///
/// Diagnostics (ingestion/processing complete, invalid or skipped samples,
/// downsampling) never change the status. Terminal phases are never left.
pub fn reduce_event(status: &mut JobStatus, event: &EngineEvent) -> bool {
    match event {
        EngineEvent::RequestProgress { fraction } => status.record_progress(*fraction),
        EngineEvent::RequestComplete { result } => {
            let output = match result {
                ReconstructionResult::ModelFile(path) => Some(path.clone()),
                ReconstructionResult::Unexpected(_) => None,
            };
            status.succeed(output)
        }
        EngineEvent::RequestError { error } => {
            status.fail(JobError::Request(error.clone()).to_string())
        }
        EngineEvent::ProcessingCancelled => status.cancel(),
        EngineEvent::Unrecognized { kind } => {
            status.fail(JobError::UnhandledEvent(kind.clone()).to_string())
        }
        EngineEvent::ProcessingComplete
        | EngineEvent::InputComplete
        | EngineEvent::InvalidSample { .. }
        | EngineEvent::SkippedSample { .. }
        | EngineEvent::AutomaticDownsampling => false,
    }
}

/// Writes one job's events into the status cell. Once this job has reached
/// a terminal phase its remaining events are only logged: the cell may
/// already have been acknowledged and handed to the next job.
pub(crate) struct EventReducer {
    job_id: JobId,
    request: Option<ReconstructionRequest>,
    writer: StatusWriter,
    finished: bool,
}

impl EventReducer {
    pub(crate) fn new(
        job_id: JobId,
        request: Option<ReconstructionRequest>,
        writer: StatusWriter,
    ) -> Self {
        Self {
            job_id,
            request,
            writer,
            finished: false,
        }
    }

    pub(crate) fn apply(&mut self, event: EngineEvent) {
        if self.finished {
            debug!(job_id = %self.job_id, kind = event.kind(), "draining event after job finished");
            return;
        }
        self.log(&event);
        let mut finished = false;
        let changed = self.writer.update(|status| {
            let changed = reduce_event(status, &event);
            finished = status.is_terminal();
            changed
        });
        self.finished = finished;
        if changed {
            debug!(job_id = %self.job_id, phase = ?self.writer.phase(), "job status updated");
        }
    }

    pub(crate) fn stream_failed(&mut self, err: &anyhow::Error) {
        let description = describe(err);
        if self.finished {
            debug!(
                job_id = %self.job_id,
                error = %description,
                "event stream failed after job finished"
            );
            return;
        }
        error!(job_id = %self.job_id, error = %description, "event stream failed");
        self.finished = true;
        self.writer
            .update(|status| status.fail(JobError::EventStream(description).to_string()));
    }

    /// Called once the sequence is over. A job that never reached a terminal
    /// phase is failed here.
    pub(crate) fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        if self.writer.update(|status| status.fail(STREAM_ENDED_EARLY)) {
            error!(job_id = %self.job_id, "{STREAM_ENDED_EARLY}");
        }
    }

    fn log(&self, event: &EngineEvent) {
        let job_id = &self.job_id;
        let request = self
            .request
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        match event {
            EngineEvent::RequestProgress { fraction } => {
                info!(%job_id, %request, fraction, "request progress");
            }
            EngineEvent::ProcessingComplete => info!(%job_id, "processing is complete"),
            EngineEvent::InputComplete => {
                info!(%job_id, "data ingestion is complete, beginning processing")
            }
            EngineEvent::RequestComplete { result } => match result {
                ReconstructionResult::ModelFile(path) => {
                    info!(%job_id, %request, model_file = %path.display(), "request complete");
                }
                ReconstructionResult::Unexpected(raw) => {
                    warn!(
                        %job_id,
                        %request,
                        result = %raw,
                        "request complete with unexpected result"
                    );
                }
            },
            EngineEvent::RequestError { error } => {
                error!(%job_id, %request, %error, "request failed");
            }
            EngineEvent::InvalidSample { id, reason } => {
                warn!(%job_id, sample_id = id, %reason, "invalid sample");
            }
            EngineEvent::SkippedSample { id } => {
                warn!(%job_id, sample_id = id, "sample was skipped by processing");
            }
            EngineEvent::AutomaticDownsampling => {
                warn!(%job_id, "automatic downsampling was applied")
            }
            EngineEvent::ProcessingCancelled => warn!(%job_id, "processing was cancelled"),
            EngineEvent::Unrecognized { kind } => {
                error!(%job_id, %kind, "unhandled engine event");
            }
        }
    }
}

/// Drains `events` in order through `reducer`. An `Err` item fails the job
/// and ends consumption.
pub(crate) async fn consume_events(mut reducer: EventReducer, mut events: EventStream) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => reducer.apply(event),
            Err(err) => {
                reducer.stream_failed(&err);
                break;
            }
        }
    }
    reducer.finish();
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
