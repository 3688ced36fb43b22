//! Observable job status shared between the controller and a presentation
//! layer.
//!
//! The controller owns the only [`StatusWriter`]. Presentation code holds
//! [`StatusObserver`]s, which read snapshots from any thread and may only
//! acknowledge a finished job back to `Waiting`.

use std::sync::{Arc, Weak};

use shared::protocol::{JobPhase, JobStatus};
use tokio::sync::watch;

pub(crate) fn status_channel() -> (StatusWriter, StatusObserver) {
    let (tx, rx) = watch::channel(JobStatus::waiting());
    let tx = Arc::new(tx);
    (
        StatusWriter { tx: tx.clone() },
        StatusObserver {
            tx: Arc::downgrade(&tx),
            rx,
        },
    )
}

#[derive(Clone)]
pub(crate) struct StatusWriter {
    tx: Arc<watch::Sender<JobStatus>>,
}

impl StatusWriter {
    /// Applies `mutate` and notifies observers only when it reports a change.
    pub(crate) fn update(&self, mutate: impl FnOnce(&mut JobStatus) -> bool) -> bool {
        self.tx.send_if_modified(mutate)
    }

    pub(crate) fn snapshot(&self) -> JobStatus {
        self.tx.borrow().clone()
    }

    pub(crate) fn phase(&self) -> JobPhase {
        self.tx.borrow().phase
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.tx.subscribe()
    }
}

#[derive(Clone)]
pub struct StatusObserver {
    tx: Weak<watch::Sender<JobStatus>>,
    rx: watch::Receiver<JobStatus>,
}

impl StatusObserver {
    pub fn snapshot(&self) -> JobStatus {
        self.rx.borrow().clone()
    }

    pub fn phase(&self) -> JobPhase {
        self.rx.borrow().phase
    }

    /// Waits for the next change and returns it, or `None` once the
    /// controller is gone.
    pub async fn changed(&mut self) -> Option<JobStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub async fn wait_for_terminal(&mut self) -> Option<JobStatus> {
        self.rx
            .wait_for(JobStatus::is_terminal)
            .await
            .ok()
            .map(|status| status.clone())
    }

    /// Returns a finished job's status to `Waiting`. Does nothing while a
    /// job is waiting to start or working.
    pub fn acknowledge(&self) -> bool {
        self.tx
            .upgrade()
            .is_some_and(|tx| tx.send_if_modified(JobStatus::acknowledge))
    }
}

/// Waits until `rx` reports a terminal phase. `false` if the sender is gone.
pub(crate) async fn reached_terminal(rx: &mut watch::Receiver<JobStatus>) -> bool {
    rx.wait_for(JobStatus::is_terminal).await.is_ok()
}
