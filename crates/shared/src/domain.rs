use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{InvalidOption, OptionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A closed set of accepted literals for one user-facing option.
pub trait OptionDomain: Sized + Copy + 'static {
    const KIND: OptionKind;
    const LITERALS: &'static [(&'static str, Self)];
}

/// Exact, case-sensitive lookup of `raw` in the literal table of `T`.
pub fn parse_option<T: OptionDomain>(raw: &str) -> Result<T, InvalidOption> {
    T::LITERALS
        .iter()
        .find(|(literal, _)| *literal == raw)
        .map(|(_, value)| *value)
        .ok_or_else(|| InvalidOption::new(T::KIND, raw))
}

macro_rules! option_domain {
    ($name:ident, $kind:expr, { $($variant:ident => $literal:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $literal),+
                }
            }
        }

        impl OptionDomain for $name {
            const KIND: OptionKind = $kind;
            const LITERALS: &'static [(&'static str, Self)] = &[$(($literal, $name::$variant)),+];
        }

        impl FromStr for $name {
            type Err = InvalidOption;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                parse_option(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

option_domain!(Detail, OptionKind::Detail, {
    Preview => "preview",
    Reduced => "reduced",
    Medium => "medium",
    Full => "full",
    Raw => "raw",
});

option_domain!(SampleOrdering, OptionKind::SampleOrdering, {
    Unordered => "unordered",
    Sequential => "sequential",
});

option_domain!(FeatureSensitivity, OptionKind::FeatureSensitivity, {
    Normal => "normal",
    High => "high",
});

impl Detail {
    pub fn label(self) -> &'static str {
        match self {
            Detail::Preview => "Preview",
            Detail::Reduced => "Reduced",
            Detail::Medium => "Medium",
            Detail::Full => "Full",
            Detail::Raw => "Raw",
        }
    }
}

/// Session configuration. Unset fields are resolved by the engine when the
/// session is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconstructionConfiguration {
    pub sample_ordering: Option<SampleOrdering>,
    pub feature_sensitivity: Option<FeatureSensitivity>,
}

impl ReconstructionConfiguration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationBuilder {
    sample_ordering: Option<SampleOrdering>,
    feature_sensitivity: Option<FeatureSensitivity>,
}

impl ConfigurationBuilder {
    pub fn sample_ordering(mut self, sample_ordering: Option<SampleOrdering>) -> Self {
        if let Some(value) = sample_ordering {
            self.sample_ordering = Some(value);
        }
        self
    }

    pub fn feature_sensitivity(mut self, feature_sensitivity: Option<FeatureSensitivity>) -> Self {
        if let Some(value) = feature_sensitivity {
            self.feature_sensitivity = Some(value);
        }
        self
    }

    pub fn build(self) -> ReconstructionConfiguration {
        ReconstructionConfiguration {
            sample_ordering: self.sample_ordering,
            feature_sensitivity: self.feature_sensitivity,
        }
    }
}

/// One desired output artifact. `detail: None` leaves the level to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconstructionRequest {
    pub output_path: PathBuf,
    pub detail: Option<Detail>,
}

impl ReconstructionRequest {
    pub fn model_file(output_path: impl Into<PathBuf>, detail: Option<Detail>) -> Self {
        Self {
            output_path: output_path.into(),
            detail,
        }
    }
}

impl fmt::Display for ReconstructionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail {
            Some(detail) => write!(f, "modelFile({}, {detail})", self.output_path.display()),
            None => write!(f, "modelFile({})", self.output_path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_literal_parses_to_its_variant() {
        for detail in Detail::ALL {
            assert_eq!(parse_option::<Detail>(detail.as_str()), Ok(*detail));
        }
        for ordering in SampleOrdering::ALL {
            assert_eq!(ordering.as_str().parse::<SampleOrdering>(), Ok(*ordering));
        }
        for sensitivity in FeatureSensitivity::ALL {
            assert_eq!(
                sensitivity.as_str().parse::<FeatureSensitivity>(),
                Ok(*sensitivity)
            );
        }
    }

    #[test]
    fn parsing_is_exact_and_case_sensitive() {
        for raw in ["Preview", "MEDIUM", " full", "raw ", "", "ultra"] {
            assert_eq!(
                parse_option::<Detail>(raw),
                Err(InvalidOption::new(OptionKind::Detail, raw))
            );
        }
        assert_eq!(
            "Sequential".parse::<SampleOrdering>(),
            Err(InvalidOption::new(OptionKind::SampleOrdering, "Sequential"))
        );
        assert_eq!(
            "medium".parse::<FeatureSensitivity>(),
            Err(InvalidOption::new(OptionKind::FeatureSensitivity, "medium"))
        );
    }

    #[test]
    fn invalid_option_names_domain_and_value() {
        let err = parse_option::<Detail>("ultra").expect_err("must reject");
        assert_eq!(err.to_string(), "invalid detail value \"ultra\"");
    }

    #[test]
    fn empty_builder_leaves_every_field_unset() {
        let configuration = ReconstructionConfiguration::builder().build();
        assert_eq!(configuration, ReconstructionConfiguration::default());
    }

    #[test]
    fn builder_is_order_independent() {
        let a = ReconstructionConfiguration::builder()
            .sample_ordering(Some(SampleOrdering::Sequential))
            .feature_sensitivity(Some(FeatureSensitivity::High))
            .build();
        let b = ReconstructionConfiguration::builder()
            .feature_sensitivity(Some(FeatureSensitivity::High))
            .sample_ordering(Some(SampleOrdering::Sequential))
            .build();
        assert_eq!(a, b);
        assert_eq!(a.sample_ordering, Some(SampleOrdering::Sequential));
        assert_eq!(a.feature_sensitivity, Some(FeatureSensitivity::High));
    }

    #[test]
    fn builder_keeps_earlier_value_when_given_none() {
        let configuration = ReconstructionConfiguration::builder()
            .sample_ordering(Some(SampleOrdering::Unordered))
            .sample_ordering(None)
            .build();
        assert_eq!(configuration.sample_ordering, Some(SampleOrdering::Unordered));
    }

    #[test]
    fn requests_compare_by_path_and_detail() {
        let default_detail = ReconstructionRequest::model_file("/tmp/out.usdz", None);
        let explicit = ReconstructionRequest::model_file("/tmp/out.usdz", Some(Detail::Medium));
        let other_path = ReconstructionRequest::model_file("/tmp/other.usdz", None);

        assert_ne!(default_detail, explicit);
        assert_ne!(default_detail, other_path);
        assert_eq!(
            default_detail,
            ReconstructionRequest::model_file("/tmp/out.usdz", None)
        );
    }
}
