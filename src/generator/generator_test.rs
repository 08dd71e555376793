//! Tests for manifest generation over a version directory.

#[cfg(test)]
mod tests {
    use crate::error::{Error, Errors};
    use crate::featuregate::{FeatureSet, ResolvedFeatureSets};
    use crate::generator::{
        Generator, GeneratorOptions, OutcomeStatus, Report, TupleOverrides, GENERATED_DIR,
        MANUAL_OVERRIDE_DIR,
    };
    use crate::merge::Merger;
    use crate::value::{from_yaml, Value};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const CRD: &str = "widgets.example.io";

    const BASE: &str = r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.io
  annotations:
    api.openshift.io/filename-pattern: widgetsMARKERS.crd.yaml
    example.io/owner: team-a
spec:
  group: example.io
  names:
    kind: Widget
    plural: widgets
  scope: Namespaced
  versions:
  - name: v1
    served: true
    storage: true
    schema:
      openAPIV3Schema:
        type: object
        properties:
          spec:
            type: object
            properties:
              size:
                type: integer
"#;

    const PREVIEW: &str = r#"metadata:
  annotations:
    feature-gate.release.openshift.io/Preview: "true"
spec:
  versions:
  - name: v1
    schema:
      openAPIV3Schema:
        properties:
          spec:
            properties:
              preview:
                type: boolean
"#;

    const MERGED_DEFAULT: &str = r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.io
  annotations:
    example.io/owner: team-a
    include.release.openshift.io/ibm-cloud-managed: "true"
    include.release.openshift.io/self-managed-high-availability: "true"
    include.release.openshift.io/single-node-developer: "true"
    release.openshift.io/feature-set: Default
spec:
  group: example.io
  names:
    kind: Widget
    plural: widgets
  scope: Namespaced
  versions:
  - name: v1
    served: true
    storage: true
    schema:
      openAPIV3Schema:
        type: object
        properties:
          spec:
            type: object
            properties:
              size:
                type: integer
"#;

    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                root: tempfile::tempdir().unwrap(),
            }
        }

        fn version_dir(&self) -> PathBuf {
            self.root.path().join("example/v1")
        }

        fn partial(&self, group: &str, crd: &str, name: &str, content: &str) {
            let dir = self.version_dir().join(group).join(crd);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), content).unwrap();
        }

        fn generated(&self, crd: &str, name: &str, content: &str) {
            self.partial(GENERATED_DIR, crd, name, content);
        }

        fn output(&self, name: &str) -> PathBuf {
            self.version_dir().join(name)
        }

        fn read_output(&self, name: &str) -> Value {
            from_yaml(&fs::read_to_string(self.output(name)).unwrap()).unwrap()
        }

        fn run(&self, verify: bool, overrides: TupleOverrides) -> Result<Report, Errors> {
            generator(verify, overrides).run(&[self.root.path().to_path_buf()])
        }
    }

    fn gates(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn generator(verify: bool, overrides: TupleOverrides) -> Generator {
        let mut feature_sets = ResolvedFeatureSets::default();
        feature_sets.insert(FeatureSet::Default, gates(&["Stable"]));
        feature_sets.insert(FeatureSet::TechPreviewNoUpgrade, gates(&["Stable", "Preview"]));
        let options = GeneratorOptions {
            verify,
            ..Default::default()
        };
        Generator::new(&options, Merger::for_crds().unwrap(), feature_sets, overrides)
    }

    fn has_preview_field(doc: &Value) -> bool {
        crate::value::to_yaml(doc).unwrap().contains("preview:")
    }

    #[test]
    fn test_gated_outputs_per_feature_set() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);
        fx.generated(CRD, "1_preview.yaml", PREVIEW);

        let report = fx.run(false, TupleOverrides::default()).unwrap();
        assert_eq!(report.count(OutcomeStatus::Written), 3);
        assert_eq!(report.outcomes[0].target, "Default");

        assert_eq!(fx.read_output("widgets-Default.crd.yaml"), from_yaml(MERGED_DEFAULT).unwrap());

        let preview = fx.read_output("widgets-TechPreviewNoUpgrade.crd.yaml");
        assert!(has_preview_field(&preview));
        let annotations = preview.annotations().and_then(Value::as_map).unwrap();
        assert_eq!(
            annotations.get("release.openshift.io/feature-set"),
            Some(&Value::from("TechPreviewNoUpgrade"))
        );
        assert!(!annotations.has("feature-gate.release.openshift.io/Preview"));
        assert!(!annotations.has("api.openshift.io/filename-pattern"));

        assert!(has_preview_field(&fx.read_output("widgets-CustomNoUpgrade.crd.yaml")));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);
        fx.generated(CRD, "1_preview.yaml", PREVIEW);

        fx.run(false, TupleOverrides::default()).unwrap();
        let first = fs::read_to_string(fx.output("widgets-Default.crd.yaml")).unwrap();

        let report = fx.run(false, TupleOverrides::default()).unwrap();
        assert_eq!(report.count(OutcomeStatus::Unchanged), 3);
        assert_eq!(fs::read_to_string(fx.output("widgets-Default.crd.yaml")).unwrap(), first);

        let report = fx.run(true, TupleOverrides::default()).unwrap();
        assert_eq!(report.count(OutcomeStatus::Verified), 3);
    }

    #[test]
    fn test_feature_set_without_partials_is_skipped() {
        let fx = Fixture::new();
        fx.generated(
            CRD,
            "preview.yaml",
            r#"metadata:
  annotations:
    api.openshift.io/filename-pattern: widgetsMARKERS.crd.yaml
    feature-gate.release.openshift.io/Preview: "true"
spec:
  scope: Namespaced
"#,
        );

        let report = fx.run(false, TupleOverrides::default()).unwrap();
        assert_eq!(report.count(OutcomeStatus::Skipped), 1);
        assert_eq!(report.count(OutcomeStatus::Written), 2);
        assert!(!fx.output("widgets-Default.crd.yaml").exists());
        assert!(fx.output("widgets-TechPreviewNoUpgrade.crd.yaml").exists());
    }

    #[test]
    fn test_ungated_crd_produces_single_output() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);
        fx.generated(CRD, "1_preview.yaml", PREVIEW);
        let overrides = TupleOverrides::from_yaml(&format!(
            "overrides:\n- crdName: {}\n  ungated: true\n",
            CRD
        ))
        .unwrap();

        let report = fx.run(false, overrides).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].target, "AllFeatureGates");
        assert_eq!(report.outcomes[0].path, Some(fx.output("widgets.crd.yaml")));

        let doc = fx.read_output("widgets.crd.yaml");
        assert!(has_preview_field(&doc));
        let annotations = doc.annotations().and_then(Value::as_map).unwrap();
        assert!(annotations
            .iter()
            .all(|(k, _)| !k.starts_with("feature-gate.release.openshift.io/")));
        assert!(!annotations.has("release.openshift.io/feature-set"));
        assert!(!fx.output("widgets-Default.crd.yaml").exists());
    }

    #[test]
    fn test_manual_overrides_merge_last() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);
        fx.partial(
            MANUAL_OVERRIDE_DIR,
            CRD,
            "00_patch.yaml",
            "metadata:\n  annotations:\n    example.io/owner-: \"\"\nspec:\n  scope: Cluster\n",
        );
        let overrides = TupleOverrides::from_yaml(&format!(
            "overrides:\n- crdName: {}\n  clusterProfiles: [single-node-developer]\n",
            CRD
        ))
        .unwrap();

        fx.run(false, overrides).unwrap();
        let doc = fx.read_output("widgets-Default.crd.yaml");
        assert_eq!(doc.get_path(&["spec", "scope"]), Some(&Value::from("Cluster")));

        let keys: Vec<&str> = doc
            .annotations()
            .and_then(Value::as_map)
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(
            keys,
            vec![
                "include.release.openshift.io/single-node-developer",
                "release.openshift.io/feature-set",
            ]
        );
    }

    #[test]
    fn test_verify_detects_drift() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);
        fx.generated(CRD, "1_preview.yaml", PREVIEW);
        fx.run(false, TupleOverrides::default()).unwrap();
        let committed = fs::read_to_string(fx.output("widgets-TechPreviewNoUpgrade.crd.yaml")).unwrap();

        fx.generated(CRD, "1_preview.yaml", &PREVIEW.replace("type: boolean", "type: string"));
        let errors = fx.run(true, TupleOverrides::default()).unwrap_err();

        assert_eq!(errors.len(), 2);
        for err in errors.iter() {
            match err {
                Error::VerifyMismatch { diff, .. } => {
                    assert!(diff.lines().any(|l| l.starts_with('-') && l.contains("type: boolean")));
                    assert!(diff.lines().any(|l| l.starts_with('+') && l.contains("type: string")));
                }
                other => panic!("expected verify mismatch, got {}", other),
            }
        }
        assert_eq!(
            fs::read_to_string(fx.output("widgets-TechPreviewNoUpgrade.crd.yaml")).unwrap(),
            committed
        );
    }

    #[test]
    fn test_verify_without_committed_files_fails() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);

        let errors = fx.run(true, TupleOverrides::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| matches!(e, Error::VerifyMismatch { .. })));
        assert!(!fx.output("widgets-Default.crd.yaml").exists());
    }

    #[test]
    fn test_errors_do_not_block_other_crds() {
        let fx = Fixture::new();
        fx.generated("a.example.io", "base.yaml", "kind: CustomResourceDefinition\n");
        fx.generated(
            "b.example.io",
            "base.yaml",
            &BASE.replace("widgetsMARKERS", "conflictMARKERS"),
        );
        fx.generated("b.example.io", "conflict.yaml", "spec:\n  scope:\n    nested: true\n");
        fx.generated(CRD, "0_base.yaml", BASE);

        let errors = fx.run(false, TupleOverrides::default()).unwrap_err();
        let errors: Vec<Error> = errors.into_iter().collect();
        assert_eq!(errors.len(), 4);
        assert!(matches!(&errors[0], Error::FilenameTemplate { crd, .. } if crd == "a.example.io"));
        match &errors[1] {
            Error::MergeConflict { crd, target, .. } => {
                assert_eq!(crd, "b.example.io");
                assert_eq!(target, "Default");
            }
            other => panic!("expected merge conflict, got {}", other),
        }
        assert!(errors[1].to_string().contains(".spec.scope"));

        assert!(fx.output("widgets-Default.crd.yaml").exists());
    }

    #[test]
    fn test_template_without_markers_rejected_for_gated_crd() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", &BASE.replace("widgetsMARKERS", "widgets"));

        let errors = fx.run(false, TupleOverrides::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.iter().next(), Some(Error::FilenameTemplate { .. })));
    }

    #[test]
    fn test_duplicate_output_paths() {
        let fx = Fixture::new();
        fx.generated("a.example.io", "base.yaml", BASE);
        fx.generated("b.example.io", "base.yaml", BASE);

        let errors = fx.run(false, TupleOverrides::default()).unwrap_err();
        assert_eq!(errors.len(), 3);
        for err in errors.iter() {
            match err {
                Error::DuplicateOutput { first, second, .. } => {
                    assert!(first.starts_with("a.example.io"));
                    assert!(second.starts_with("b.example.io"));
                }
                other => panic!("expected duplicate output, got {}", other),
            }
        }
    }

    #[test]
    fn test_discover_version_dirs() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);
        fs::create_dir_all(fx.root.path().join("other/v2")).unwrap();

        let dirs = crate::generator::discover_version_dirs(&[fx.root.path().to_path_buf()]).unwrap();
        assert_eq!(dirs, vec![fx.version_dir()]);

        let missing = crate::generator::discover_version_dirs(&[Path::new("/nonexistent/input").to_path_buf()]);
        assert!(matches!(missing, Err(Error::Io { .. })));
    }

    #[test]
    fn test_generate_crd() {
        let fx = Fixture::new();
        fx.generated(CRD, "0_base.yaml", BASE);

        let outcomes = generator(false, TupleOverrides::default())
            .generate_crd(&fx.version_dir(), CRD)
            .unwrap();
        let targets: Vec<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(targets, vec!["Default", "TechPreviewNoUpgrade", "CustomNoUpgrade"]);
    }
}
