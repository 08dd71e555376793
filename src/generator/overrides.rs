//! Per-CRD exceptions to the default generation rules.

use crate::error::{Error, Result};
use crate::featuregate::FeatureSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// TupleOverride marks a CRD as ungated and/or replaces the cluster profiles
/// injected into its outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TupleOverride {
    /// Name of the CRD directory the override applies to.
    pub crd_name: String,
    /// Restricts the override to one feature set. Unset applies to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_set: Option<FeatureSet>,
    #[serde(default)]
    pub ungated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_profiles: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OverridesFile {
    #[serde(default)]
    overrides: Vec<TupleOverride>,
}

/// TupleOverrides is the validated override table of a run.
#[derive(Debug, Clone, Default)]
pub struct TupleOverrides {
    entries: Vec<TupleOverride>,
}

impl TupleOverrides {
    /// Validates the entries and builds the table.
    ///
    /// An ungated CRD produces a single output, so it cannot also carry
    /// feature-set-specific entries.
    pub fn new(entries: Vec<TupleOverride>) -> Result<TupleOverrides> {
        let invalid = |message: String| Error::InvalidOverrides { message };
        let mut seen: BTreeMap<(&str, Option<FeatureSet>), usize> = BTreeMap::new();

        for (i, entry) in entries.iter().enumerate() {
            if entry.crd_name.is_empty() {
                return Err(invalid(format!("entry {} has an empty crdName", i)));
            }
            if entry.ungated {
                if let Some(fs) = entry.feature_set {
                    return Err(invalid(format!(
                        "{}: an ungated override cannot be restricted to feature set {}",
                        entry.crd_name, fs
                    )));
                }
            }
            if let Some(prev) = seen.insert((entry.crd_name.as_str(), entry.feature_set), i) {
                return Err(invalid(format!(
                    "{}: entries {} and {} target the same feature set",
                    entry.crd_name, prev, i
                )));
            }
        }

        for entry in entries.iter().filter(|e| e.ungated) {
            if let Some(other) = entries
                .iter()
                .find(|e| e.crd_name == entry.crd_name && e.feature_set.is_some())
            {
                return Err(invalid(format!(
                    "{}: marked ungated but also has an override for feature set {}",
                    entry.crd_name,
                    other.feature_set.map(|fs| fs.as_str()).unwrap_or_default()
                )));
            }
        }

        Ok(TupleOverrides { entries })
    }

    /// Parses an override table of the form `overrides: [...]`.
    pub fn from_yaml(yaml: &str) -> Result<TupleOverrides> {
        let file: Option<OverridesFile> =
            serde_yaml::from_str(yaml).map_err(|e| Error::InvalidOverrides {
                message: e.to_string(),
            })?;
        TupleOverrides::new(file.unwrap_or_default().overrides)
    }

    pub fn load(path: &Path) -> Result<TupleOverrides> {
        let content = fs::read_to_string(path).map_err(|e| Error::InvalidOverrides {
            message: format!("{}: {}", path.display(), e),
        })?;
        TupleOverrides::from_yaml(&content)
    }

    pub fn entries(&self) -> &[TupleOverride] {
        &self.entries
    }

    /// Returns the entry that marks the CRD ungated, if any.
    pub fn lookup_ungated(&self, crd_name: &str) -> Option<&TupleOverride> {
        self.entries
            .iter()
            .find(|e| e.ungated && e.crd_name == crd_name)
    }

    pub fn is_ungated(&self, crd_name: &str) -> bool {
        self.lookup_ungated(crd_name).is_some()
    }

    /// Returns the cluster profiles to inject for a CRD output.
    ///
    /// An entry for the exact feature set takes precedence over one covering
    /// every feature set. Ungated outputs pass `None` and only see the latter.
    pub fn cluster_profiles_for(
        &self,
        crd_name: &str,
        feature_set: Option<FeatureSet>,
    ) -> Option<&[String]> {
        let matching = |fs: Option<FeatureSet>| {
            self.entries
                .iter()
                .find(|e| e.crd_name == crd_name && e.feature_set == fs)
                .and_then(|e| e.cluster_profiles.as_deref())
        };
        feature_set
            .and_then(|fs| matching(Some(fs)))
            .or_else(|| matching(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERRIDES: &str = r#"
overrides:
- crdName: clusterversions.config.openshift.io
  ungated: true
  clusterProfiles: [self-managed-high-availability]
- crdName: widgets.example.io
  clusterProfiles: [ibm-cloud-managed]
- crdName: widgets.example.io
  featureSet: TechPreviewNoUpgrade
  clusterProfiles: [single-node-developer]
"#;

    #[test]
    fn test_lookup() {
        let overrides = TupleOverrides::from_yaml(OVERRIDES).unwrap();
        assert_eq!(overrides.entries().len(), 3);
        assert!(overrides.is_ungated("clusterversions.config.openshift.io"));
        assert!(!overrides.is_ungated("widgets.example.io"));

        assert_eq!(
            overrides.cluster_profiles_for("widgets.example.io", Some(FeatureSet::TechPreviewNoUpgrade)),
            Some(&["single-node-developer".to_string()][..])
        );
        assert_eq!(
            overrides.cluster_profiles_for("widgets.example.io", Some(FeatureSet::Default)),
            Some(&["ibm-cloud-managed".to_string()][..])
        );
        assert_eq!(
            overrides.cluster_profiles_for("clusterversions.config.openshift.io", None),
            Some(&["self-managed-high-availability".to_string()][..])
        );
        assert_eq!(overrides.cluster_profiles_for("other", None), None);
    }

    #[test]
    fn test_empty_table() {
        assert!(TupleOverrides::from_yaml("").unwrap().entries().is_empty());
        assert!(TupleOverrides::from_yaml("overrides: []\n").unwrap().entries().is_empty());
    }

    #[test]
    fn test_rejects_ungated_feature_set_entry() {
        let err = TupleOverrides::from_yaml(
            "overrides:\n- crdName: a\n  ungated: true\n  featureSet: Default\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidOverrides { .. }));
    }

    #[test]
    fn test_rejects_ungated_crd_with_feature_set_overrides() {
        let err = TupleOverrides::from_yaml(
            "overrides:\n- crdName: a\n  ungated: true\n- crdName: a\n  featureSet: Default\n  clusterProfiles: []\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("marked ungated"));
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_sets() {
        assert!(TupleOverrides::from_yaml("overrides:\n- crdName: a\n- crdName: a\n").is_err());
        assert!(TupleOverrides::from_yaml("overrides:\n- crdName: a\n  featureSet: Bogus\n").is_err());
        assert!(TupleOverrides::from_yaml("overrides:\n- crdName: \"\"\n").is_err());
    }
}
