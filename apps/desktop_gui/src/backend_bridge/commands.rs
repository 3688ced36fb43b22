//! Backend commands queued from UI to backend worker.

use shared::domain::Detail;
use std::path::PathBuf;

pub enum BackendCommand {
    StartReconstruction {
        input_dir: PathBuf,
        output_path: PathBuf,
        detail: Option<Detail>,
    },
}
