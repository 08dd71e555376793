//! Named feature sets.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FeatureSet is one of the curated collections of feature gates a cluster
/// can run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureSet {
    Default,
    TechPreviewNoUpgrade,
    CustomNoUpgrade,
}

impl FeatureSet {
    /// Every feature set, in the order manifests are generated.
    pub const ALL: [FeatureSet; 3] = [
        FeatureSet::Default,
        FeatureSet::TechPreviewNoUpgrade,
        FeatureSet::CustomNoUpgrade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSet::Default => "Default",
            FeatureSet::TechPreviewNoUpgrade => "TechPreviewNoUpgrade",
            FeatureSet::CustomNoUpgrade => "CustomNoUpgrade",
        }
    }

    /// CustomNoUpgrade places no constraint on gates, so it has no rendered
    /// gate list to load.
    pub fn has_gate_list(&self) -> bool {
        !matches!(self, FeatureSet::CustomNoUpgrade)
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureSet::ALL
            .into_iter()
            .find(|fs| fs.as_str() == s)
            .ok_or_else(|| Error::UnknownFeatureSet { name: s.to_string() })
    }
}
