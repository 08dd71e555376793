//! Post-processing, serialization and writing of merged manifests.

use crate::error::{Error, Result};
use crate::featuregate::FeatureSet;
use crate::manifest::{
    cluster_profile_annotation, CLUSTER_PROFILE_PREFIX, DEFAULT_CLUSTER_PROFILES,
    DELETE_MARKER_SUFFIX, FEATURE_GATE_PREFIX, FEATURE_SET_ANNOTATION,
    FILENAME_PATTERN_ANNOTATION,
};
use crate::value::{to_yaml, Value};
use similar::TextDiff;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// What to record in the annotations of one output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalizeOptions<'a> {
    /// Feature set of a gated output. None for ungated outputs.
    pub feature_set: Option<FeatureSet>,
    /// Cluster profiles that replace whatever the partials declared.
    pub cluster_profiles: Option<&'a [String]>,
}

/// Result of emitting one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Written,
    Unchanged,
    Verified,
}

/// OutputWriter turns merged documents into files, or checks committed
/// files against them in verify mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputWriter {
    verify: bool,
}

impl OutputWriter {
    pub fn new(verify: bool) -> Self {
        OutputWriter { verify }
    }

    pub fn is_verify(&self) -> bool {
        self.verify
    }

    /// Rewrites a merged document into its installable form.
    ///
    /// `path` is the output file and only used for error messages.
    pub fn finalize(&self, mut doc: Value, path: &Path, options: &FinalizeOptions) -> Result<Value> {
        if let Some(Value::Map(metadata)) = doc.as_map_mut().and_then(|m| m.get_mut("metadata")) {
            metadata.delete("managedFields");
        }

        let annotations = doc.annotations_mut().ok_or_else(|| Error::Annotation {
            path: path.to_path_buf(),
            message: "metadata.annotations must be a map".to_string(),
        })?;

        annotations.retain(|key, _| {
            !key.starts_with(FEATURE_GATE_PREFIX) && key != FILENAME_PATTERN_ANNOTATION
        });

        match options.feature_set {
            Some(fs) => annotations.set(FEATURE_SET_ANNOTATION, Value::from(fs.as_str())),
            None => {
                annotations.delete(FEATURE_SET_ANNOTATION);
            }
        }

        match options.cluster_profiles {
            Some(profiles) => {
                annotations.retain(|key, _| !key.starts_with(CLUSTER_PROFILE_PREFIX));
                for profile in profiles {
                    annotations.set(cluster_profile_annotation(profile), Value::from("true"));
                }
            }
            None => {
                let declared = annotations.iter().any(|(key, _)| {
                    key.starts_with(CLUSTER_PROFILE_PREFIX) && !key.ends_with(DELETE_MARKER_SUFFIX)
                });
                if !declared {
                    for profile in DEFAULT_CLUSTER_PROFILES {
                        annotations.set(cluster_profile_annotation(profile), Value::from("true"));
                    }
                }
            }
        }

        let markers: Vec<String> = annotations
            .iter()
            .map(|(key, _)| key)
            .filter(|key| key.len() > 1 && key.ends_with(DELETE_MARKER_SUFFIX))
            .cloned()
            .collect();
        for marker in markers {
            annotations.delete(&marker);
            annotations.delete(&marker[..marker.len() - 1]);
            debug!(annotation = %marker, "resolved delete marker");
        }

        if annotations.is_empty() {
            if let Some(Value::Map(metadata)) = doc.as_map_mut().and_then(|m| m.get_mut("metadata")) {
                metadata.delete("annotations");
            }
        }

        Ok(doc)
    }

    /// Serializes a document. Map keys are sorted, so equal documents always
    /// produce equal bytes.
    pub fn serialize(&self, doc: &Value, path: &Path) -> Result<String> {
        to_yaml(doc).map_err(|e| Error::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Writes the document to `path`, or compares it with the committed file
    /// in verify mode. Verify mode never writes.
    pub fn emit(&self, doc: &Value, path: &Path) -> Result<EmitOutcome> {
        let generated = self.serialize(doc, path)?;
        let existing = match fs::read_to_string(path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(path, e)),
        };

        if self.verify {
            let committed = existing.unwrap_or_default();
            if committed == generated {
                info!(path = %path.display(), "verified");
                return Ok(EmitOutcome::Verified);
            }
            warn!(path = %path.display(), "generated output differs from committed file");
            return Err(Error::VerifyMismatch {
                path: path.to_path_buf(),
                diff: unified_diff(path, &committed, &generated),
            });
        }

        if existing.as_deref() == Some(generated.as_str()) {
            debug!(path = %path.display(), "unchanged");
            return Ok(EmitOutcome::Unchanged);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(path, generated).map_err(|e| Error::io(path, e))?;
        info!(path = %path.display(), "wrote");
        Ok(EmitOutcome::Written)
    }
}

fn unified_diff(path: &Path, committed: &str, generated: &str) -> String {
    let committed_name = format!("a/{}", path.display());
    let generated_name = format!("b/{}", path.display());
    TextDiff::from_lines(committed, generated)
        .unified_diff()
        .context_radius(3)
        .header(&committed_name, &generated_name)
        .to_string()
}
