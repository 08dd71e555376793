//! Selection of the partial manifests that take part in a merge.

use super::partial::PartialManifest;
use crate::error::Result;
use crate::featuregate::FeatureSet;
use std::collections::BTreeSet;

/// ManifestFilter decides whether a partial participates in a merge target.
pub trait ManifestFilter {
    /// Returns true if the partial should be merged for this target.
    fn should_include(&self, partial: &PartialManifest) -> Result<bool>;

    /// Human readable name of the target, used in errors and logs.
    fn label(&self) -> String;
}

/// AllFeatureGates includes every partial. Used for ungated CRDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFeatureGates;

impl ManifestFilter for AllFeatureGates {
    fn should_include(&self, _partial: &PartialManifest) -> Result<bool> {
        Ok(true)
    }

    fn label(&self) -> String {
        "AllFeatureGates".to_string()
    }
}

/// CustomNoUpgrade includes every partial since any gate may be turned on.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomNoUpgrade;

impl ManifestFilter for CustomNoUpgrade {
    fn should_include(&self, partial: &PartialManifest) -> Result<bool> {
        // Still surface malformed annotations.
        partial.feature_gates()?;
        Ok(true)
    }

    fn label(&self) -> String {
        FeatureSet::CustomNoUpgrade.to_string()
    }
}

/// ForFeatureSet includes ungated partials and partials declaring at least
/// one gate enabled in the feature set.
#[derive(Debug, Clone)]
pub struct ForFeatureSet {
    feature_set: FeatureSet,
    enabled: BTreeSet<String>,
}

impl ForFeatureSet {
    pub fn new(feature_set: FeatureSet, enabled: BTreeSet<String>) -> Self {
        ForFeatureSet {
            feature_set,
            enabled,
        }
    }

    pub fn enabled(&self) -> &BTreeSet<String> {
        &self.enabled
    }
}

impl ManifestFilter for ForFeatureSet {
    fn should_include(&self, partial: &PartialManifest) -> Result<bool> {
        if partial.is_ungated()? {
            return Ok(true);
        }
        let gates = partial.feature_gates()?;
        Ok(gates.iter().any(|gate| self.enabled.contains(gate)))
    }

    fn label(&self) -> String {
        self.feature_set.to_string()
    }
}

/// FilterTarget is the filter the generator applies for one output.
#[derive(Debug, Clone)]
pub enum FilterTarget {
    AllFeatureGates(AllFeatureGates),
    CustomNoUpgrade(CustomNoUpgrade),
    ForFeatureSet(ForFeatureSet),
}

impl FilterTarget {
    /// Builds the filter for a feature set. CustomNoUpgrade includes
    /// everything; any other set without resolved gates only includes
    /// ungated partials.
    pub fn for_feature_set(feature_set: FeatureSet, enabled: Option<&BTreeSet<String>>) -> Self {
        if feature_set == FeatureSet::CustomNoUpgrade {
            return FilterTarget::CustomNoUpgrade(CustomNoUpgrade);
        }
        let gates = enabled.cloned().unwrap_or_default();
        FilterTarget::ForFeatureSet(ForFeatureSet::new(feature_set, gates))
    }

    fn filter(&self) -> &dyn ManifestFilter {
        match self {
            FilterTarget::AllFeatureGates(f) => f,
            FilterTarget::CustomNoUpgrade(f) => f,
            FilterTarget::ForFeatureSet(f) => f,
        }
    }
}

impl ManifestFilter for FilterTarget {
    fn should_include(&self, partial: &PartialManifest) -> Result<bool> {
        self.filter().should_include(partial)
    }

    fn label(&self) -> String {
        self.filter().label()
    }
}

/// Returns the partials accepted by the filter, keeping their order.
pub fn select<'a>(
    filter: &dyn ManifestFilter,
    partials: &'a [PartialManifest],
) -> Result<Vec<&'a PartialManifest>> {
    let mut selected = Vec::new();
    for partial in partials {
        if filter.should_include(partial)? {
            selected.push(partial);
        }
    }
    Ok(selected)
}
