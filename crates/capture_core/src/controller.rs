//! Runs one reconstruction job at a time against a [`ReconstructionEngine`].
//!
//! A job goes through `start` (session creation), `submit` (the single model
//! file request) and `run`, which hands the session's event stream to a
//! consumer task and returns immediately. A supervisor task watches the status
//! cell, gives the consumer a bounded window to drain once the job is
//! terminal, and releases the session afterwards.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use engine_bridge::{EngineSession, ReconstructionEngine};
use shared::{
    domain::{JobId, ReconstructionConfiguration, ReconstructionRequest},
    protocol::{JobPhase, JobStatus},
};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::{
    error::{describe, JobError},
    reducer::{consume_events, EventReducer},
    status::{reached_terminal, status_channel, StatusObserver, StatusWriter},
};

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// How long the consumer may keep draining events after the job reached
    /// a terminal phase.
    pub drain_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// A created session waiting for its request and for `run`.
pub struct Job {
    id: JobId,
    input_dir: PathBuf,
    session: Box<dyn EngineSession>,
    request: Option<ReconstructionRequest>,
    guard: AbandonGuard,
}

impl Job {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn request(&self) -> Option<&ReconstructionRequest> {
        self.request.as_ref()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("input_dir", &self.input_dir)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Fails a submitted job whose events will never be consumed, so the status
/// cell does not stay `Working` forever. Armed only once the job's request
/// was accepted.
struct AbandonGuard {
    job_id: JobId,
    writer: Option<StatusWriter>,
}

impl AbandonGuard {
    fn arm(&mut self, writer: StatusWriter) {
        self.writer = Some(writer);
    }

    fn disarm(&mut self) {
        self.writer = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let failed = writer.update(|status| {
            status.phase == JobPhase::Working
                && status.fail("job was dropped before its events were consumed")
        });
        if failed {
            warn!(job_id = %self.job_id, "submitted job dropped before run");
        }
    }
}

pub struct JobController {
    engine: Arc<dyn ReconstructionEngine>,
    options: ControllerOptions,
    writer: StatusWriter,
    observer: StatusObserver,
    active: Option<JoinHandle<()>>,
}

impl JobController {
    pub fn new(engine: Arc<dyn ReconstructionEngine>, options: ControllerOptions) -> Self {
        let (writer, observer) = status_channel();
        Self {
            engine,
            options,
            writer,
            observer,
            active: None,
        }
    }

    /// Handle for the presentation layer. Clones stay valid after the
    /// controller is dropped.
    pub fn status(&self) -> StatusObserver {
        self.observer.clone()
    }

    /// Creates the engine session for `input_dir`.
    ///
    /// A creation failure fails the status immediately; no events are ever
    /// consumed for that job.
    pub async fn start(
        &mut self,
        input_dir: impl AsRef<Path>,
        configuration: &ReconstructionConfiguration,
    ) -> Result<Job, JobError> {
        self.ensure_idle()?;

        let input_dir = input_dir.as_ref().to_path_buf();
        let id = JobId::new();
        info!(
            job_id = %id,
            input = %input_dir.display(),
            sample_ordering = configuration.sample_ordering.map(|v| v.as_str()),
            feature_sensitivity = configuration.feature_sensitivity.map(|v| v.as_str()),
            "creating reconstruction session"
        );

        match self.engine.create_session(&input_dir, configuration).await {
            Ok(session) => Ok(Job {
                id,
                input_dir,
                session,
                request: None,
                guard: AbandonGuard {
                    job_id: id,
                    writer: None,
                },
            }),
            Err(err) => {
                let err = JobError::SessionCreation(describe(&err));
                error!(job_id = %id, error = %err, "session creation failed");
                self.writer.update(|status| status.fail(err.to_string()));
                Err(err)
            }
        }
    }

    /// Submits the job's single request. Success moves the status to
    /// `Working`; failure fails it.
    pub async fn submit(
        &self,
        job: &mut Job,
        request: ReconstructionRequest,
    ) -> Result<(), JobError> {
        if job.request.is_some() {
            return Err(JobError::AlreadySubmitted);
        }

        info!(job_id = %job.id, %request, "submitting request");
        if let Err(err) = job.session.process(std::slice::from_ref(&request)).await {
            let err = JobError::Submission(describe(&err));
            error!(job_id = %job.id, error = %err, "request submission failed");
            self.writer.update(|status| status.fail(err.to_string()));
            return Err(err);
        }

        job.request = Some(request);
        self.writer.update(JobStatus::begin_work);
        job.guard.arm(self.writer.clone());
        Ok(())
    }

    /// Starts consuming the job's events in the background and returns
    /// without waiting. Must be called within a Tokio runtime.
    pub fn run(&mut self, job: Job) -> Result<(), JobError> {
        let Job {
            id,
            input_dir: _,
            session,
            request,
            mut guard,
        } = job;

        if request.is_none() {
            return Err(JobError::NotSubmitted);
        }

        let events = match session.outputs() {
            Ok(events) => events,
            Err(err) => {
                let err = JobError::EventStream(describe(&err));
                error!(job_id = %id, error = %err, "could not obtain event stream");
                guard.disarm();
                self.writer.update(|status| status.fail(err.to_string()));
                return Err(err);
            }
        };
        guard.disarm();

        let reducer = EventReducer::new(id, request, self.writer.clone());
        let consumer = tokio::spawn(consume_events(reducer, events));
        self.active = Some(tokio::spawn(supervise(
            id,
            session,
            consumer,
            self.writer.clone(),
            self.options.drain_timeout,
        )));
        info!(job_id = %id, "event consumption started");
        Ok(())
    }

    /// Waits for the supervised job (if any) to finish and returns the
    /// resulting status.
    pub async fn wait(&mut self) -> JobStatus {
        if let Some(handle) = self.active.take() {
            if let Err(err) = handle.await {
                error!(error = %err, "job supervisor aborted");
                self.writer
                    .update(|status| status.fail(format!("job supervisor aborted: {err}")));
            }
        }
        self.writer.snapshot()
    }

    /// `start`, `submit`, `run` and `wait` in one call.
    pub async fn execute(
        &mut self,
        input_dir: impl AsRef<Path>,
        configuration: &ReconstructionConfiguration,
        request: ReconstructionRequest,
    ) -> Result<JobStatus, JobError> {
        let mut job = self.start(input_dir, configuration).await?;
        self.submit(&mut job, request).await?;
        self.run(job)?;
        Ok(self.wait().await)
    }

    fn ensure_idle(&mut self) -> Result<(), JobError> {
        let phase = self.writer.phase();
        if let Some(handle) = self.active.as_ref().filter(|handle| !handle.is_finished()) {
            match phase {
                JobPhase::Working => return Err(JobError::Busy),
                // Acknowledged while the previous stream was still draining.
                JobPhase::Waiting => handle.abort(),
                _ => {}
            }
        }
        if phase != JobPhase::Waiting {
            return Err(JobError::NotReady(phase));
        }
        self.active = None;
        Ok(())
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };
        handle.abort();
        let failed = self.writer.update(|status| {
            status.phase == JobPhase::Working && status.fail("controller shut down")
        });
        if failed {
            warn!("controller dropped with a job in progress");
        }
    }
}

/// Aborts the wrapped task when dropped.
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn supervise(
    job_id: JobId,
    session: Box<dyn EngineSession>,
    consumer: JoinHandle<()>,
    writer: StatusWriter,
    drain_timeout: Duration,
) {
    let mut consumer = TaskGuard(consumer);
    let mut status = writer.subscribe();

    tokio::select! {
        joined = &mut consumer.0 => consumer_joined(job_id, &writer, joined),
        reached = reached_terminal(&mut status) => {
            if reached {
                match tokio::time::timeout(drain_timeout, &mut consumer.0).await {
                    Ok(joined) => consumer_joined(job_id, &writer, joined),
                    Err(_) => {
                        warn!(
                            job_id = %job_id,
                            timeout_ms = drain_timeout.as_millis() as u64,
                            "event stream still open after job finished; abandoning it"
                        );
                    }
                }
            } else {
                let joined = (&mut consumer.0).await;
                consumer_joined(job_id, &writer, joined);
            }
        }
    }

    drop(consumer);
    drop(session);
    info!(job_id = %job_id, phase = ?writer.phase(), "session released");
}

/// Fails the job if its consumer died while the job was still working. Once
/// the job is finished the status cell may already belong to an
/// acknowledged or newer job, so it is left alone.
fn consumer_joined(job_id: JobId, writer: &StatusWriter, joined: Result<(), JoinError>) {
    let Err(err) = joined else {
        return;
    };
    let failed = writer.update(|status| {
        status.phase == JobPhase::Working
            && status.fail(format!("event consumer aborted: {err}"))
    });
    if failed {
        error!(job_id = %job_id, error = %err, "event consumer aborted");
    } else {
        warn!(job_id = %job_id, error = %err, "event consumer aborted while draining");
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
