use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use capture_core::StatusObserver;
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::{
    domain::Detail,
    protocol::{JobPhase, JobStatus},
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::{
    events::{UiError, UiErrorCategory, UiErrorContext, UiEvent},
    orchestration::dispatch_backend_command,
};

/// Quality picker entries. `None` leaves the detail level to the engine.
pub const QUALITY_CHOICES: [Option<Detail>; 6] = [
    Some(Detail::Preview),
    Some(Detail::Reduced),
    Some(Detail::Medium),
    Some(Detail::Full),
    Some(Detail::Raw),
    None,
];

pub const DEFAULT_QUALITY: Option<Detail> = Some(Detail::Medium);

pub fn quality_label(choice: Option<Detail>) -> &'static str {
    choice.map_or("Engine default", Detail::label)
}

pub fn output_path(output_dir: &Path, output_file_name: &str) -> PathBuf {
    output_dir.join(output_file_name)
}

/// Start stays disabled until the backend is up, both folders are chosen, and
/// no job is working.
pub fn start_allowed(phase: JobPhase, backend_ready: bool, input: bool, output: bool) -> bool {
    backend_ready && input && output && phase != JobPhase::Working
}

pub struct CaptureApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    output_file_name: String,

    status: Option<StatusObserver>,
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    quality: Option<Detail>,

    status_line: String,
    backend_error: Option<UiError>,
}

impl CaptureApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        output_file_name: String,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            output_file_name,
            status: None,
            input_dir: None,
            output_dir: None,
            quality: DEFAULT_QUALITY,
            status_line: "Waiting for backend...".to_string(),
            backend_error: None,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::BackendReady {
                    status,
                    default_detail,
                } => {
                    self.status = Some(status);
                    if default_detail.is_some() {
                        self.quality = default_detail;
                    }
                    self.status_line = "Ready".to_string();
                }
                UiEvent::Info(message) => {
                    self.status_line = message;
                }
                UiEvent::Error(err) => {
                    tracing::warn!(category = ?err.category(), "{}", err.message());
                    self.backend_error = Some(err);
                }
            }
        }
    }

    fn snapshot(&self) -> JobStatus {
        self.status
            .as_ref()
            .map(StatusObserver::snapshot)
            .unwrap_or_default()
    }

    fn start_reconstruction(&mut self) {
        let (Some(input_dir), Some(output_dir)) =
            (self.input_dir.clone(), self.output_dir.as_deref())
        else {
            return;
        };
        if let Some(status) = &self.status {
            status.acknowledge();
        }
        let output_path = output_path(output_dir, &self.output_file_name);
        let queued = dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::StartReconstruction {
                input_dir,
                output_path,
                detail: self.quality,
            },
            &mut self.status_line,
        );
        if !queued {
            self.backend_error = Some(UiError::from_message(
                UiErrorContext::General,
                self.status_line.clone(),
            ));
        }
    }

    fn show_main_panel(&mut self, ctx: &egui::Context, snapshot: &JobStatus) {
        let working = snapshot.phase == JobPhase::Working;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Object Capture");
            ui.add_space(8.0);

            ui.add_enabled_ui(!working, |ui| {
                folder_row(
                    ui,
                    "Source",
                    "Choose the folder of captured images",
                    &mut self.input_dir,
                );
                folder_row(
                    ui,
                    "Destination",
                    "Choose where to save the model",
                    &mut self.output_dir,
                );

                ui.horizontal(|ui| {
                    ui.label("Quality");
                    egui::ComboBox::from_id_salt("quality_picker")
                        .selected_text(quality_label(self.quality))
                        .show_ui(ui, |ui| {
                            for choice in QUALITY_CHOICES {
                                ui.selectable_value(
                                    &mut self.quality,
                                    choice,
                                    quality_label(choice),
                                );
                            }
                        });
                });
            });

            ui.add_space(8.0);
            let enabled = start_allowed(
                snapshot.phase,
                self.status.is_some(),
                self.input_dir.is_some(),
                self.output_dir.is_some(),
            );
            if ui.add_enabled(enabled, egui::Button::new("Start")).clicked() {
                self.start_reconstruction();
            }

            ui.add_space(8.0);
            match snapshot.phase {
                JobPhase::Waiting => {}
                JobPhase::Working => {
                    ui.add(
                        egui::ProgressBar::new(snapshot.progress_fraction as f32)
                            .show_percentage()
                            .animate(true),
                    );
                }
                JobPhase::Success => {
                    let written = snapshot
                        .output
                        .as_deref()
                        .map(|path| path.display().to_string())
                        .unwrap_or_else(|| "the destination folder".to_string());
                    ui.label(format!("Model written to {written}"));
                }
                JobPhase::Cancelled => {
                    ui.label("Reconstruction was cancelled");
                }
                JobPhase::Failed => {
                    ui.colored_label(ui.visuals().error_fg_color, "Reconstruction failed");
                }
            }

            ui.separator();
            ui.small(&self.status_line);
        });
    }

    fn show_failure_window(&mut self, ctx: &egui::Context, snapshot: &JobStatus) {
        if snapshot.phase != JobPhase::Failed {
            return;
        }
        let err = UiError::from_message(
            UiErrorContext::Reconstruction,
            snapshot.error_message.as_deref().unwrap_or("unknown error"),
        );
        let mut dismissed = false;
        egui::Window::new(err.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(err.message());
                if err.is_input_problem() {
                    ui.small("Check the selected folders and try again.");
                }
                if ui.button("Dismiss").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            if let Some(status) = &self.status {
                status.acknowledge();
            }
        }
    }

    fn show_backend_error(&mut self, ctx: &egui::Context) {
        let Some(err) = &self.backend_error else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new(err.title())
            .id(egui::Id::new("backend_error_window"))
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(err.message());
                if err.category() == UiErrorCategory::Busy {
                    ui.small("Wait for the current reconstruction to finish.");
                }
                if ui.button("Dismiss").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.backend_error = None;
        }
    }
}

fn folder_row(ui: &mut egui::Ui, label: &str, dialog_title: &str, folder: &mut Option<PathBuf>) {
    ui.horizontal(|ui| {
        ui.label(label);
        let shown = folder
            .as_deref()
            .map_or_else(|| "Not selected".to_string(), |path| path.display().to_string());
        ui.monospace(shown);
        if ui.button("Choose...").clicked() {
            if let Some(path) = rfd::FileDialog::new().set_title(dialog_title).pick_folder() {
                *folder = Some(path);
            }
        }
    });
}

impl eframe::App for CaptureApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        let snapshot = self.snapshot();
        self.show_main_panel(ctx, &snapshot);
        self.show_failure_window(ctx, &snapshot);
        self.show_backend_error(ctx);

        if snapshot.phase == JobPhase::Working {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}
