use std::path::PathBuf;

mod backend_bridge;
mod controller;
mod ui;

use capture_core::load_settings;
use clap::Parser;
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::ui::CaptureApp;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file (defaults to ./object_capture.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref());
    let output_file_name = settings.output_file_name.clone();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(16);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(64);
    backend_bridge::runtime::launch(settings, cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Object Capture")
            .with_inner_size([560.0, 320.0])
            .with_min_inner_size([480.0, 260.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Object Capture",
        options,
        Box::new(|_cc| Ok(Box::new(CaptureApp::new(cmd_tx, ui_rx, output_file_name)))),
    )
}
