use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Detail,
    SampleOrdering,
    FeatureSensitivity,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::Detail => "detail",
            OptionKind::SampleOrdering => "sample ordering",
            OptionKind::FeatureSensitivity => "feature sensitivity",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-supplied option string that matched none of the accepted literals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} value {raw:?}")]
pub struct InvalidOption {
    pub kind: OptionKind,
    pub raw: String,
}

impl InvalidOption {
    pub fn new(kind: OptionKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }
}
