use std::{
    path::{self, Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use capture_core::{load_settings, JobController, RawJobOptions};
use clap::Parser;
use engine_bridge::{CommandEngine, CommandEngineOptions};
use shared::protocol::JobPhase;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reconstructs a 3D model file from a folder of captured images.
#[derive(Parser, Debug)]
#[command(name = "object-capture", version)]
struct Args {
    /// Folder containing the captured images.
    input: PathBuf,
    /// Model file to write, e.g. `mug.usdz`.
    output: PathBuf,
    /// Detail level: preview, reduced, medium, full or raw.
    #[arg(short, long)]
    detail: Option<String>,
    /// Sample ordering: unordered or sequential.
    #[arg(short = 'o', long)]
    sample_ordering: Option<String>,
    /// Feature sensitivity: normal or high.
    #[arg(short, long)]
    feature_sensitivity: Option<String>,
    /// Settings file (defaults to ./object_capture.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reconstruction engine program, overriding the settings file.
    #[arg(long)]
    engine: Option<PathBuf>,
}

impl Args {
    fn job_options(&self) -> RawJobOptions {
        RawJobOptions {
            detail: self.detail.clone(),
            sample_ordering: self.sample_ordering.clone(),
            feature_sensitivity: self.feature_sensitivity.clone(),
        }
    }
}

/// The engine is handed absolute paths; relative ones are taken from the
/// current directory.
fn resolve(path: &Path) -> Result<PathBuf> {
    path::absolute(path).with_context(|| format!("cannot resolve path '{}'", path.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let settings = load_settings(args.config.as_deref());
    let options = args.job_options().or(settings.job_options()).validate()?;
    let input = resolve(&args.input)?;
    let output = resolve(&args.output)?;

    let program = args
        .engine
        .clone()
        .unwrap_or_else(|| settings.engine_program.clone());
    let engine = CommandEngine::new(
        CommandEngineOptions::new(program).with_args(settings.engine_args.iter().cloned()),
    );
    info!(program = %engine.options().program.display(), "using reconstruction engine");
    let mut controller = JobController::new(Arc::new(engine), settings.controller_options());

    info!(input = %input.display(), output = %output.display(), "using input and output");
    let result = controller
        .execute(&input, &options.configuration, options.request_for(&output))
        .await;

    let status = match result {
        Ok(status) => status,
        Err(_) => controller.status().snapshot(),
    };
    match status.phase {
        JobPhase::Success => {
            let output = status.output.unwrap_or(output);
            println!("Model written to {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        JobPhase::Cancelled => {
            eprintln!("Reconstruction was cancelled");
            Ok(ExitCode::FAILURE)
        }
        _ => {
            eprintln!(
                "Reconstruction failed: {}",
                status.error_message.as_deref().unwrap_or("unknown error")
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
