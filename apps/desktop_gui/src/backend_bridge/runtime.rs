//! Backend worker: a dedicated thread with its own Tokio runtime that owns the
//! job controller and serves UI commands.

use std::{path::Path, sync::Arc, thread};

use capture_core::{JobController, JobError, JobOptions, Settings};
use crossbeam_channel::{Receiver, Sender};
use engine_bridge::{CommandEngine, CommandEngineOptions};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        let defaults = match settings.job_options().validate() {
            Ok(options) => options,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: settings contain an {err}"),
                )));
                tracing::error!("invalid option in settings: {err}");
                return;
            }
        };

        let engine = CommandEngine::new(
            CommandEngineOptions::new(settings.engine_program.clone())
                .with_args(settings.engine_args.iter().cloned()),
        );
        tracing::info!(
            program = %engine.options().program.display(),
            "backend worker using reconstruction engine"
        );

        runtime.block_on(async move {
            let mut controller =
                JobController::new(Arc::new(engine), settings.controller_options());
            let _ = ui_tx.try_send(UiEvent::BackendReady {
                status: controller.status(),
                default_detail: defaults.detail,
            });

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::StartReconstruction {
                        input_dir,
                        output_path,
                        detail,
                    } => {
                        let options = JobOptions { detail, ..defaults };
                        match start_job(&mut controller, &input_dir, &output_path, options).await {
                            Ok(()) => {
                                let _ = ui_tx.try_send(UiEvent::Info(format!(
                                    "Reconstructing {}",
                                    input_dir.display()
                                )));
                            }
                            // Job-fatal errors already show up through the status cell.
                            Err(err) if err.is_job_fatal() => {}
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                    UiErrorContext::StartJob,
                                    err.to_string(),
                                )));
                            }
                        }
                    }
                }
            }
            tracing::info!("ui command channel closed; backend worker stopping");
        });
    });
}

async fn start_job(
    controller: &mut JobController,
    input_dir: &Path,
    output_path: &Path,
    options: JobOptions,
) -> Result<(), JobError> {
    let mut job = controller.start(input_dir, &options.configuration).await?;
    controller.submit(&mut job, options.request_for(output_path)).await?;
    controller.run(job)
}
