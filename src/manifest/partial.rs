//! Partial CRD manifests as read from disk.

use super::annotations::FEATURE_GATE_PREFIX;
use crate::error::{Error, Result};
use crate::value::{self, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// PartialManifest is one fragment of a CRD. It is never modified after
/// loading; merging produces new documents.
#[derive(Debug, Clone)]
pub struct PartialManifest {
    path: PathBuf,
    document: Value,
}

/// Returns true for files that hold partial manifests.
pub fn is_manifest_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml") | Some("json")
    )
}

impl PartialManifest {
    pub fn new(path: impl Into<PathBuf>, document: Value) -> Self {
        PartialManifest {
            path: path.into(),
            document,
        }
    }

    /// Reads and decodes a YAML or JSON partial manifest.
    pub fn load(path: &Path) -> Result<PartialManifest> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let parse_error = |message: String| Error::Parse {
            path: path.to_path_buf(),
            message,
        };

        let document = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            value::from_json(&content).map_err(|e| parse_error(e.to_string()))?
        } else {
            value::from_yaml(&content).map_err(|e| parse_error(e.to_string()))?
        };

        if !document.is_map() {
            return Err(parse_error(format!(
                "expected a map at the document root, got {}",
                document.kind_name()
            )));
        }
        Ok(PartialManifest::new(path, document))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for ordering and log messages.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Returns the gate names declared through feature-gate annotations.
    ///
    /// An annotation with nothing after the prefix yields the empty name.
    pub fn feature_gates(&self) -> Result<BTreeSet<String>> {
        let annotations = match self.document.annotations() {
            None | Some(Value::Null) => return Ok(BTreeSet::new()),
            Some(Value::Map(m)) => m,
            Some(other) => {
                return Err(Error::Annotation {
                    path: self.path.clone(),
                    message: format!(
                        "metadata.annotations must be a map, got {}",
                        other.kind_name()
                    ),
                })
            }
        };

        Ok(annotations
            .iter()
            .filter_map(|(key, _)| key.strip_prefix(FEATURE_GATE_PREFIX))
            .map(str::to_string)
            .collect())
    }

    /// True when the partial applies regardless of enabled gates.
    pub fn is_ungated(&self) -> Result<bool> {
        let gates = self.feature_gates()?;
        Ok(gates.is_empty() || gates.contains(""))
    }
}
