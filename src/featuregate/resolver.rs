//! Loads enabled feature gates from rendered FeatureGate manifests.

use super::feature_set::FeatureSet;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the rendered FeatureGate manifests.
pub const DEFAULT_FEATURE_GATE_DIR: &str = "payload-manifests/featuregates";

#[derive(Debug, Deserialize)]
struct FeatureGateManifest {
    status: FeatureGateStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeatureGateStatus {
    feature_gates: Vec<FeatureGateDetails>,
}

#[derive(Debug, Deserialize)]
struct FeatureGateDetails {
    #[serde(default)]
    enabled: Vec<FeatureGateAttributes>,
}

#[derive(Debug, Deserialize)]
struct FeatureGateAttributes {
    name: String,
}

/// FeatureSetResolver reads `featureGate-<FeatureSet>.yaml` files from a
/// directory of rendered FeatureGate manifests.
#[derive(Debug, Clone)]
pub struct FeatureSetResolver {
    dir: PathBuf,
}

impl FeatureSetResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FeatureSetResolver { dir: dir.into() }
    }

    /// Path of the rendered manifest for a feature set.
    pub fn manifest_path(&self, feature_set: FeatureSet) -> PathBuf {
        self.dir.join(format!("featureGate-{}.yaml", feature_set))
    }

    /// Returns the gates enabled by the named feature set.
    pub fn resolve_enabled_gates(&self, name: &str) -> Result<BTreeSet<String>> {
        let feature_set: FeatureSet = name.parse()?;
        self.enabled_gates(feature_set)
    }

    pub fn enabled_gates(&self, feature_set: FeatureSet) -> Result<BTreeSet<String>> {
        let path = self.manifest_path(feature_set);
        let load_error = |message: String| Error::ConfigLoad {
            feature_set: feature_set.to_string(),
            path: path.clone(),
            message,
        };

        let content = fs::read_to_string(&path).map_err(|e| load_error(e.to_string()))?;
        let gates = parse_enabled_gates(&content).map_err(load_error)?;
        debug!(%feature_set, count = gates.len(), "loaded enabled feature gates");
        Ok(gates)
    }

    /// Resolves every feature set that carries a gate list.
    pub fn resolve_all(&self) -> Result<ResolvedFeatureSets> {
        let mut resolved = ResolvedFeatureSets::default();
        for feature_set in FeatureSet::ALL {
            if feature_set.has_gate_list() {
                let gates = self.enabled_gates(feature_set)?;
                resolved.insert(feature_set, gates);
            }
        }
        Ok(resolved)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn parse_enabled_gates(content: &str) -> std::result::Result<BTreeSet<String>, String> {
    let manifest: FeatureGateManifest =
        serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    let first = manifest
        .status
        .feature_gates
        .into_iter()
        .next()
        .ok_or_else(|| "status.featureGates is empty".to_string())?;
    Ok(first.enabled.into_iter().map(|g| g.name).collect())
}

/// Enabled gates per feature set, resolved once per run.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFeatureSets {
    gates: BTreeMap<FeatureSet, BTreeSet<String>>,
}

impl ResolvedFeatureSets {
    pub fn insert(&mut self, feature_set: FeatureSet, gates: BTreeSet<String>) {
        self.gates.insert(feature_set, gates);
    }

    pub fn enabled(&self, feature_set: FeatureSet) -> Option<&BTreeSet<String>> {
        self.gates.get(&feature_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_MANIFEST: &str = r#"apiVersion: config.openshift.io/v1
kind: FeatureGate
metadata:
  name: cluster
spec: {}
status:
  featureGates:
  - version: ""
    enabled:
    - name: GatewayAPI
    - name: Example
    disabled:
    - name: NewThing
"#;

    #[test]
    fn test_resolve_enabled_gates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("featureGate-Default.yaml"), DEFAULT_MANIFEST).unwrap();

        let resolver = FeatureSetResolver::new(dir.path());
        let gates = resolver.resolve_enabled_gates("Default").unwrap();
        assert_eq!(
            gates,
            BTreeSet::from(["Example".to_string(), "GatewayAPI".to_string()])
        );
    }

    #[test]
    fn test_unknown_feature_set() {
        let resolver = FeatureSetResolver::new("/nonexistent");
        assert!(matches!(
            resolver.resolve_enabled_gates("Everything"),
            Err(Error::UnknownFeatureSet { .. })
        ));
    }

    #[test]
    fn test_missing_manifest_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FeatureSetResolver::new(dir.path());
        let err = resolver.resolve_enabled_gates("TechPreviewNoUpgrade").unwrap_err();
        assert!(matches!(err, Error::ConfigLoad { ref feature_set, .. } if feature_set == "TechPreviewNoUpgrade"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_manifest_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("featureGate-Default.yaml"),
            "status:\n  featureGates: []\n",
        )
        .unwrap();
        let resolver = FeatureSetResolver::new(dir.path());
        let err = resolver.resolve_enabled_gates("Default").unwrap_err();
        assert!(err.to_string().contains("status.featureGates is empty"));

        std::fs::write(dir.path().join("featureGate-Default.yaml"), "kind: FeatureGate\n").unwrap();
        assert!(matches!(
            resolver.resolve_enabled_gates("Default"),
            Err(Error::ConfigLoad { .. })
        ));
    }

    #[test]
    fn test_resolve_all_skips_custom() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("featureGate-Default.yaml"), DEFAULT_MANIFEST).unwrap();
        std::fs::write(
            dir.path().join("featureGate-TechPreviewNoUpgrade.yaml"),
            DEFAULT_MANIFEST.replace("    disabled:\n    - name: NewThing\n", "    - name: NewThing\n"),
        )
        .unwrap();

        let resolved = FeatureSetResolver::new(dir.path()).resolve_all().unwrap();
        assert_eq!(resolved.enabled(FeatureSet::Default).unwrap().len(), 2);
        assert!(resolved
            .enabled(FeatureSet::TechPreviewNoUpgrade)
            .unwrap()
            .contains("NewThing"));
        assert!(resolved.enabled(FeatureSet::CustomNoUpgrade).is_none());
    }
}
