//! Generation of merged CRD manifests per feature set.

use super::output::{EmitOutcome, FinalizeOptions, OutputWriter};
use super::overrides::TupleOverrides;
use crate::error::{Error, Errors, Result};
use crate::featuregate::{FeatureSet, FeatureSetResolver, ResolvedFeatureSets, DEFAULT_FEATURE_GATE_DIR};
use crate::manifest::{
    is_manifest_file, select, AllFeatureGates, FilterTarget, ManifestFilter, PartialManifest,
    FEATURE_SET_ANNOTATION, FILENAME_MARKERS, FILENAME_PATTERN_ANNOTATION,
};
use crate::merge::Merger;
use crate::schema::{crd_merge_schema, Schema, TypeRef, CRD_ROOT_TYPE};
use crate::value::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory below a version directory holding generated partials.
pub const GENERATED_DIR: &str = "zz_generated.featuregated-crd-manifests";

/// Directory below a version directory holding hand-written partials.
pub const MANUAL_OVERRIDE_DIR: &str = "manual-override-crd-manifests";

/// GeneratorOptions collects the configuration of a run.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Compare with committed files instead of writing.
    pub verify: bool,
    /// Directory of rendered `featureGate-<FeatureSet>.yaml` manifests.
    pub feature_gate_dir: PathBuf,
    /// Optional tuple override table.
    pub overrides: Option<PathBuf>,
    /// Optional merge schema replacing the built-in CRD schema.
    pub schema: Option<PathBuf>,
    /// Root type of the merged documents within the schema.
    pub type_name: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            verify: false,
            feature_gate_dir: PathBuf::from(DEFAULT_FEATURE_GATE_DIR),
            overrides: None,
            schema: None,
            type_name: CRD_ROOT_TYPE.to_string(),
        }
    }
}

/// Final state of one (CRD, target) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Written,
    Unchanged,
    Verified,
    /// No partial matched the target.
    Skipped,
}

impl From<EmitOutcome> for OutcomeStatus {
    fn from(outcome: EmitOutcome) -> Self {
        match outcome {
            EmitOutcome::Written => OutcomeStatus::Written,
            EmitOutcome::Unchanged => OutcomeStatus::Unchanged,
            EmitOutcome::Verified => OutcomeStatus::Verified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub crd_name: String,
    pub target: String,
    /// Output file. None for skipped tuples.
    pub path: Option<PathBuf>,
    pub status: OutcomeStatus,
}

/// Report summarizes a successful run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub outcomes: Vec<Outcome>,
}

impl Report {
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} unchanged, {} verified, {} skipped",
            self.count(OutcomeStatus::Written),
            self.count(OutcomeStatus::Unchanged),
            self.count(OutcomeStatus::Verified),
            self.count(OutcomeStatus::Skipped)
        )
    }
}

/// Generator folds the partial manifests of every CRD into one manifest per
/// feature set, or a single manifest for ungated CRDs.
#[derive(Debug, Clone)]
pub struct Generator {
    merger: Merger,
    feature_sets: ResolvedFeatureSets,
    overrides: TupleOverrides,
    writer: OutputWriter,
}

impl Generator {
    pub fn new(
        options: &GeneratorOptions,
        merger: Merger,
        feature_sets: ResolvedFeatureSets,
        overrides: TupleOverrides,
    ) -> Self {
        Generator {
            merger,
            feature_sets,
            overrides,
            writer: OutputWriter::new(options.verify),
        }
    }

    /// Loads the schema, the enabled gates and the override table named by
    /// the options. Any failure here is fatal for the run.
    pub fn from_options(options: &GeneratorOptions) -> Result<Generator> {
        let schema = match &options.schema {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                Schema::from_yaml(&content)?
            }
            None => crd_merge_schema()?,
        };
        let merger = Merger::new(schema, TypeRef::named(options.type_name.as_str()))?;

        let feature_sets = FeatureSetResolver::new(&options.feature_gate_dir).resolve_all()?;

        let overrides = match &options.overrides {
            Some(path) => TupleOverrides::load(path)?,
            None => TupleOverrides::default(),
        };

        Ok(Generator::new(options, merger, feature_sets, overrides))
    }

    /// Processes every version directory found below `inputs`.
    ///
    /// All CRDs are processed even when some fail; the errors are returned
    /// together, ordered by directory, CRD and feature set.
    pub fn run(&self, inputs: &[PathBuf]) -> std::result::Result<Report, Errors> {
        let version_dirs = discover_version_dirs(inputs)?;
        if version_dirs.is_empty() {
            warn!("no directories containing {} found", GENERATED_DIR);
        }

        let mut errors = Errors::new();
        let mut report = Report::default();
        for dir in &version_dirs {
            report.outcomes.extend(self.generate_version(dir, &mut errors));
        }
        errors.into_result()?;
        Ok(report)
    }

    /// Generates the manifests of every CRD in one version directory.
    pub fn generate_version(&self, version_dir: &Path, errors: &mut Errors) -> Vec<Outcome> {
        info!(dir = %version_dir.display(), "processing");
        let crd_names = match list_crd_names(version_dir) {
            Ok(names) => names,
            Err(e) => {
                errors.add(e);
                return Vec::new();
            }
        };

        let mut claimed = BTreeMap::new();
        let mut outcomes = Vec::new();
        for crd_name in &crd_names {
            outcomes.extend(self.process_crd(version_dir, crd_name, &mut claimed, errors));
        }
        outcomes
    }

    /// Generates the manifests of a single CRD.
    pub fn generate_crd(
        &self,
        version_dir: &Path,
        crd_name: &str,
    ) -> std::result::Result<Vec<Outcome>, Errors> {
        let mut errors = Errors::new();
        let outcomes = self.process_crd(version_dir, crd_name, &mut BTreeMap::new(), &mut errors);
        errors.into_result()?;
        Ok(outcomes)
    }

    fn process_crd(
        &self,
        version_dir: &Path,
        crd_name: &str,
        claimed: &mut BTreeMap<PathBuf, String>,
        errors: &mut Errors,
    ) -> Vec<Outcome> {
        let partials = match load_partials(version_dir, crd_name) {
            Ok(partials) => partials,
            Err(e) => {
                errors.extend(e);
                return Vec::new();
            }
        };
        if partials.is_empty() {
            warn!(crd = crd_name, "no partial manifests found");
            return Vec::new();
        }

        let ungated = self.overrides.is_ungated(crd_name);
        let template = match filename_template(crd_name, &partials, ungated) {
            Ok(template) => template,
            Err(e) => {
                errors.add(e);
                return Vec::new();
            }
        };

        let targets: Vec<(Option<FeatureSet>, FilterTarget)> = if ungated {
            vec![(None, FilterTarget::AllFeatureGates(AllFeatureGates))]
        } else {
            FeatureSet::ALL
                .into_iter()
                .map(|fs| {
                    let target = FilterTarget::for_feature_set(fs, self.feature_sets.enabled(fs));
                    (Some(fs), target)
                })
                .collect()
        };

        let mut outcomes = Vec::new();
        for (feature_set, target) in targets {
            let label = target.label();
            let planned = self.merge_tuple(version_dir, crd_name, &partials, &template, feature_set, &target);
            let (path, doc) = match planned {
                Ok(Some(planned)) => planned,
                Ok(None) => {
                    info!(crd = crd_name, target = %label, "no partials match, skipping");
                    outcomes.push(Outcome {
                        crd_name: crd_name.to_string(),
                        target: label,
                        path: None,
                        status: OutcomeStatus::Skipped,
                    });
                    continue;
                }
                Err(e) => {
                    errors.add(e);
                    continue;
                }
            };

            if let Some(first) = claimed.get(&path) {
                errors.add(Error::DuplicateOutput {
                    path,
                    first: first.clone(),
                    second: format!("{} ({})", crd_name, label),
                });
                continue;
            }
            claimed.insert(path.clone(), format!("{} ({})", crd_name, label));

            match self.writer.emit(&doc, &path) {
                Ok(emitted) => outcomes.push(Outcome {
                    crd_name: crd_name.to_string(),
                    target: label,
                    path: Some(path),
                    status: emitted.into(),
                }),
                Err(e) => errors.add(e),
            }
        }
        outcomes
    }

    /// Merges the partials selected for one target and finalizes the
    /// result. Returns None when no partial is selected.
    fn merge_tuple(
        &self,
        version_dir: &Path,
        crd_name: &str,
        partials: &[PartialManifest],
        template: &str,
        feature_set: Option<FeatureSet>,
        target: &FilterTarget,
    ) -> Result<Option<(PathBuf, Value)>> {
        let selected = select(target, partials)?;
        if selected.is_empty() {
            return Ok(None);
        }
        for partial in &selected {
            debug!(crd = crd_name, target = %target.label(), partial = %partial.file_name(), "selected");
        }

        let merged = self
            .merger
            .merge_all(seed(feature_set), selected.iter().map(|p| p.document()))
            .map_err(|source| Error::MergeConflict {
                crd: crd_name.to_string(),
                target: target.label(),
                source,
            })?;

        let path = version_dir.join(output_file_name(template, feature_set));
        let options = FinalizeOptions {
            feature_set,
            cluster_profiles: self.overrides.cluster_profiles_for(crd_name, feature_set),
        };
        let doc = self.writer.finalize(merged, &path, &options)?;
        Ok(Some((path, doc)))
    }
}

/// Finds the directories below `inputs` that contain generated partials.
pub fn discover_version_dirs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for input in inputs {
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(input.as_path()).to_path_buf();
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_dir() || entry.file_name() == GENERATED_DIR {
                continue;
            }
            if entry.path().join(GENERATED_DIR).is_dir() {
                dirs.push(entry.into_path());
            }
        }
    }
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

fn list_crd_names(version_dir: &Path) -> Result<Vec<String>> {
    let generated = version_dir.join(GENERATED_DIR);
    let mut names = Vec::new();
    for entry in fs::read_dir(&generated).map_err(|e| Error::io(&generated, e))? {
        let entry = entry.map_err(|e| Error::io(&generated, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Loads the generated partials of a CRD followed by its manual overrides,
/// each group sorted by file name.
fn load_partials(version_dir: &Path, crd_name: &str) -> std::result::Result<Vec<PartialManifest>, Errors> {
    let mut partials = Vec::new();
    let mut errors = Errors::new();

    for group in [GENERATED_DIR, MANUAL_OVERRIDE_DIR] {
        let crd_dir = version_dir.join(group).join(crd_name);
        if !crd_dir.is_dir() {
            continue;
        }
        let files = match manifest_files(&crd_dir) {
            Ok(files) => files,
            Err(e) => {
                errors.add(e);
                continue;
            }
        };
        for file in files {
            match PartialManifest::load(&file) {
                Ok(partial) => {
                    debug!(crd = crd_name, partial = %file.display(), "loaded");
                    partials.push(partial);
                }
                Err(e) => errors.add(e),
            }
        }
    }

    errors.into_result()?;
    Ok(partials)
}

fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && is_manifest_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Reads the output file name template from the partials. Later partials
/// override earlier ones, as they would in the merged document.
fn filename_template(crd_name: &str, partials: &[PartialManifest], ungated: bool) -> Result<String> {
    let template_error = |message: String| Error::FilenameTemplate {
        crd: crd_name.to_string(),
        message,
    };

    let template = partials
        .iter()
        .filter_map(|p| p.document().annotations())
        .filter_map(|a| a.as_map())
        .filter_map(|a| a.get(FILENAME_PATTERN_ANNOTATION))
        .filter_map(Value::as_str)
        .last()
        .ok_or_else(|| template_error(format!("missing {} annotation", FILENAME_PATTERN_ANNOTATION)))?;

    if template.is_empty() || template.contains('/') || template.contains('\\') || template == ".." {
        return Err(template_error(format!("{:?} is not a plain file name", template)));
    }
    if !ungated && !template.contains(FILENAME_MARKERS) {
        return Err(template_error(format!(
            "{:?} must contain {} to keep feature set outputs apart",
            template, FILENAME_MARKERS
        )));
    }
    Ok(template.to_string())
}

fn output_file_name(template: &str, feature_set: Option<FeatureSet>) -> String {
    let suffix = feature_set.map(|fs| format!("-{}", fs)).unwrap_or_default();
    template.replace(FILENAME_MARKERS, &suffix)
}

/// Starting document of a merge. Gated outputs record their feature set.
fn seed(feature_set: Option<FeatureSet>) -> Value {
    let mut seed = Value::Map(Map::new());
    if let Some(fs) = feature_set {
        if let Some(annotations) = seed.annotations_mut() {
            annotations.set(FEATURE_SET_ANNOTATION, Value::from(fs.as_str()));
        }
    }
    seed
}
