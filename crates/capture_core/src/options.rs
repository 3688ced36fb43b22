use std::path::PathBuf;

use serde::Deserialize;
use shared::{
    domain::{
        parse_option, Detail, FeatureSensitivity, OptionDomain, ReconstructionConfiguration,
        ReconstructionRequest, SampleOrdering,
    },
    error::InvalidOption,
};

/// Unvalidated option strings as they arrive from the command line or a
/// settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawJobOptions {
    pub detail: Option<String>,
    pub sample_ordering: Option<String>,
    pub feature_sensitivity: Option<String>,
}

impl RawJobOptions {
    /// Field-wise merge: values present on `self` win over `fallback`.
    pub fn or(self, fallback: RawJobOptions) -> Self {
        Self {
            detail: self.detail.or(fallback.detail),
            sample_ordering: self.sample_ordering.or(fallback.sample_ordering),
            feature_sensitivity: self.feature_sensitivity.or(fallback.feature_sensitivity),
        }
    }

    /// Validates detail, then sample ordering, then feature sensitivity,
    /// stopping at the first invalid value.
    pub fn validate(&self) -> Result<JobOptions, InvalidOption> {
        let detail = parse_present::<Detail>(self.detail.as_deref())?;
        let sample_ordering = parse_present::<SampleOrdering>(self.sample_ordering.as_deref())?;
        let feature_sensitivity =
            parse_present::<FeatureSensitivity>(self.feature_sensitivity.as_deref())?;

        Ok(JobOptions {
            configuration: ReconstructionConfiguration::builder()
                .sample_ordering(sample_ordering)
                .feature_sensitivity(feature_sensitivity)
                .build(),
            detail,
        })
    }
}

fn parse_present<T: OptionDomain>(
    raw: Option<&str>,
) -> Result<Option<T>, InvalidOption> {
    raw.map(parse_option::<T>).transpose()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobOptions {
    pub configuration: ReconstructionConfiguration,
    pub detail: Option<Detail>,
}

impl JobOptions {
    pub fn request_for(&self, output_path: impl Into<PathBuf>) -> ReconstructionRequest {
        ReconstructionRequest::model_file(output_path, self.detail)
    }
}
