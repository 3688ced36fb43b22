use super::*;
use crate::status::status_channel;
use shared::protocol::JobPhase;
use std::path::PathBuf;

fn fold(events: &[EngineEvent]) -> JobStatus {
    let mut status = JobStatus::waiting();
    for event in events {
        reduce_event(&mut status, event);
    }
    status
}

fn complete() -> EngineEvent {
    EngineEvent::RequestComplete {
        result: ReconstructionResult::ModelFile(PathBuf::from("/tmp/out.usdz")),
    }
}

fn diagnostics() -> Vec<EngineEvent> {
    vec![
        EngineEvent::InvalidSample {
            id: 3,
            reason: "missing depth".to_string(),
        },
        EngineEvent::SkippedSample { id: 4 },
        EngineEvent::AutomaticDownsampling,
    ]
}

fn assert_error_iff_failed(status: &JobStatus) {
    assert_eq!(
        status.error_message.is_some(),
        status.phase == JobPhase::Failed,
        "error message must be set exactly when failed: {status:?}"
    );
}

#[test]
fn progress_values_are_reported_exactly() {
    let mut status = JobStatus::waiting();
    for fraction in [0.1, 0.35, 0.9] {
        reduce_event(&mut status, &EngineEvent::RequestProgress { fraction });
        assert_eq!(status.phase, JobPhase::Working);
        assert_eq!(status.progress_fraction, fraction);
    }
}

#[test]
fn informational_events_do_not_change_status() {
    let mut events = vec![EngineEvent::InputComplete, EngineEvent::ProcessingComplete];
    events.extend(diagnostics());
    let mut status = JobStatus::waiting();
    for event in &events {
        assert!(!reduce_event(&mut status, event), "{event:?} changed status");
    }
    assert_eq!(status, JobStatus::waiting());
}

#[test]
fn sequence_ending_in_completion_succeeds() {
    let status = fold(&[
        EngineEvent::InputComplete,
        EngineEvent::RequestProgress { fraction: 0.5 },
        EngineEvent::SkippedSample { id: 1 },
        complete(),
    ]);
    assert_eq!(status.phase, JobPhase::Success);
    assert_eq!(status.progress_fraction, 0.5);
    assert_eq!(status.output, Some(PathBuf::from("/tmp/out.usdz")));
    assert_error_iff_failed(&status);
}

#[test]
fn sequence_ending_in_request_error_fails_with_description() {
    let status = fold(&[
        EngineEvent::RequestProgress { fraction: 0.2 },
        EngineEvent::RequestError {
            error: "not enough overlap between samples".to_string(),
        },
    ]);
    assert_eq!(status.phase, JobPhase::Failed);
    assert_eq!(
        status.error_message.as_deref(),
        Some("not enough overlap between samples")
    );
    assert_error_iff_failed(&status);
}

#[test]
fn unexpected_result_still_succeeds_without_output() {
    let status = fold(&[EngineEvent::RequestComplete {
        result: ReconstructionResult::Unexpected("{\"type\":\"request_complete\"}".to_string()),
    }]);
    assert_eq!(status.phase, JobPhase::Success);
    assert_eq!(status.output, None);
}

#[test]
fn unrecognized_event_fails_the_job() {
    let status = fold(&[
        EngineEvent::RequestProgress { fraction: 0.4 },
        EngineEvent::Unrecognized {
            kind: "stitching_started".to_string(),
        },
    ]);
    assert_eq!(status.phase, JobPhase::Failed);
    let message = status.error_message.expect("message");
    assert!(message.starts_with("unhandled event"), "{message}");
    assert!(message.contains("stitching_started"), "{message}");
}

#[test]
fn cancellation_is_terminal_without_error() {
    let status = fold(&[
        EngineEvent::RequestProgress { fraction: 0.3 },
        EngineEvent::ProcessingCancelled,
        complete(),
    ]);
    assert_eq!(status.phase, JobPhase::Cancelled);
    assert_error_iff_failed(&status);
}

#[test]
fn terminal_state_survives_further_events() {
    for terminal in [
        complete(),
        EngineEvent::RequestError {
            error: "disk full".to_string(),
        },
    ] {
        let mut status = fold(&[EngineEvent::RequestProgress { fraction: 0.7 }, terminal]);
        let settled = status.clone();

        let mut trailing = diagnostics();
        trailing.push(EngineEvent::RequestProgress { fraction: 0.95 });
        trailing.push(EngineEvent::ProcessingComplete);
        for event in &trailing {
            assert!(!reduce_event(&mut status, event));
        }
        assert_eq!(status, settled);
    }
}

#[test]
fn first_terminal_event_wins() {
    let status = fold(&[
        EngineEvent::RequestError {
            error: "first".to_string(),
        },
        complete(),
        EngineEvent::Unrecognized {
            kind: "later".to_string(),
        },
    ]);
    assert_eq!(status.phase, JobPhase::Failed);
    assert_eq!(status.error_message.as_deref(), Some("first"));
}

fn stream_of(items: Vec<anyhow::Result<EngineEvent>>) -> EventStream {
    futures::stream::iter(items).boxed()
}

#[tokio::test]
async fn stream_error_fails_with_underlying_description() {
    let (writer, observer) = status_channel();
    let reducer = EventReducer::new(JobId::new(), None, writer);
    consume_events(
        reducer,
        stream_of(vec![
            Ok(EngineEvent::RequestProgress { fraction: 0.25 }),
            Err(anyhow::anyhow!("pipe closed").context("failed to read engine output")),
            Ok(complete()),
        ]),
    )
    .await;

    let status = observer.snapshot();
    assert_eq!(status.phase, JobPhase::Failed);
    assert_eq!(
        status.error_message.as_deref(),
        Some("event stream failed: failed to read engine output: pipe closed")
    );
}

#[tokio::test]
async fn stream_ending_without_result_fails() {
    let (writer, observer) = status_channel();
    let reducer = EventReducer::new(JobId::new(), None, writer);
    consume_events(
        reducer,
        stream_of(vec![
            Ok(EngineEvent::InputComplete),
            Ok(EngineEvent::RequestProgress { fraction: 0.6 }),
        ]),
    )
    .await;

    let status = observer.snapshot();
    assert_eq!(status.phase, JobPhase::Failed);
    assert_eq!(status.error_message.as_deref(), Some(STREAM_ENDED_EARLY));
}

#[tokio::test]
async fn consumer_drains_events_after_success() {
    let (writer, observer) = status_channel();
    let request = ReconstructionRequest::model_file("/tmp/out.usdz", None);
    let reducer = EventReducer::new(JobId::new(), Some(request), writer);
    let mut events = vec![Ok(EngineEvent::RequestProgress { fraction: 0.5 }), Ok(complete())];
    events.extend(diagnostics().into_iter().map(Ok));
    events.push(Ok(EngineEvent::ProcessingComplete));
    consume_events(reducer, stream_of(events)).await;

    let status = observer.snapshot();
    assert_eq!(status.phase, JobPhase::Success);
    assert_eq!(status.progress_fraction, 0.5);
    assert_eq!(status.error_message, None);
}

#[test]
fn finished_job_leaves_an_acknowledged_status_alone() {
    let (writer, observer) = status_channel();
    let mut reducer = EventReducer::new(JobId::new(), None, writer);
    reducer.apply(EngineEvent::RequestProgress { fraction: 0.8 });
    reducer.apply(complete());
    assert!(observer.acknowledge());

    reducer.apply(EngineEvent::RequestProgress { fraction: 0.95 });
    reducer.apply(EngineEvent::RequestError {
        error: "late failure".to_string(),
    });
    reducer.stream_failed(&anyhow::anyhow!("pipe closed"));
    reducer.finish();

    assert_eq!(observer.snapshot(), JobStatus::waiting());
}
