use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{controller::ControllerOptions, options::RawJobOptions};

pub const DEFAULT_SETTINGS_FILE: &str = "object_capture.toml";
const ENV_PREFIX: &str = "OBJECT_CAPTURE__";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine_program: PathBuf,
    pub engine_args: Vec<String>,
    pub detail: Option<String>,
    pub sample_ordering: Option<String>,
    pub feature_sensitivity: Option<String>,
    pub drain_timeout_secs: u64,
    pub output_file_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine_program: "photogrammetry-engine".into(),
            engine_args: Vec::new(),
            detail: None,
            sample_ordering: None,
            feature_sensitivity: None,
            drain_timeout_secs: 5,
            output_file_name: "output.usdz".into(),
        }
    }
}

impl Settings {
    /// Option strings from the settings, still to be validated.
    pub fn job_options(&self) -> RawJobOptions {
        RawJobOptions {
            detail: self.detail.clone(),
            sample_ordering: self.sample_ordering.clone(),
            feature_sensitivity: self.feature_sensitivity.clone(),
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("ENGINE_PROGRAM") {
            self.engine_program = v.into();
        }
        if let Some(v) = var("ENGINE_ARGS") {
            self.engine_args = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = var("DETAIL") {
            self.detail = Some(v);
        }
        if let Some(v) = var("SAMPLE_ORDERING") {
            self.sample_ordering = Some(v);
        }
        if let Some(v) = var("FEATURE_SENSITIVITY") {
            self.feature_sensitivity = Some(v);
        }
        if let Some(v) = var("DRAIN_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(parsed) => self.drain_timeout_secs = parsed,
                Err(_) => warn!(value = %v, "ignoring non-numeric {ENV_PREFIX}DRAIN_TIMEOUT_SECS"),
            }
        }
    }
}

/// Reads `path` (or [`DEFAULT_SETTINGS_FILE`]) and then applies
/// `OBJECT_CAPTURE__*` environment overrides. A missing file yields the
/// defaults; an unreadable or unparsable one is logged and skipped.
pub fn load_settings(path: Option<&Path>) -> Settings {
    load_settings_with(path, |name| std::env::var(name).ok())
}

fn load_settings_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Settings {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match toml::from_str::<Settings>(&raw) {
            Ok(parsed) => {
                debug!(path = %path.display(), "loaded settings file");
                parsed
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unparsable settings file");
                Settings::default()
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => Settings::default(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
            Settings::default()
        }
    };
    settings.apply_env(lookup);
    settings
}
