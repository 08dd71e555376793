//! Conflicts raised while merging two documents.

use crate::fieldpath::Path;
use thiserror::Error;

/// MergeConflict reports a place where an overlay cannot be applied on top
/// of the accumulated document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeConflict {
    #[error("{path}: cannot merge {overlay} onto existing {base}")]
    TypeMismatch {
        path: Path,
        base: &'static str,
        overlay: &'static str,
    },

    #[error("{path}: schema expects {expected}, got {actual}")]
    SchemaMismatch {
        path: Path,
        expected: String,
        actual: &'static str,
    },

    #[error("{path}: elements of a keyed list must be maps, got {actual}")]
    NotAMap { path: Path, actual: &'static str },

    #[error("{path}: list element is missing key field {key:?}")]
    MissingKey { path: Path, key: String },

    #[error("{path}: duplicate entry in keyed list")]
    DuplicateKey { path: Path },
}

impl MergeConflict {
    /// Returns the location of the conflict.
    pub fn path(&self) -> &Path {
        match self {
            MergeConflict::TypeMismatch { path, .. }
            | MergeConflict::SchemaMismatch { path, .. }
            | MergeConflict::NotAMap { path, .. }
            | MergeConflict::MissingKey { path, .. }
            | MergeConflict::DuplicateKey { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldpath::PathElement;

    #[test]
    fn test_conflict_display() {
        let conflict = MergeConflict::TypeMismatch {
            path: Path::from_elements(vec![
                PathElement::field_name("spec"),
                PathElement::field_name("group"),
            ]),
            base: "map",
            overlay: "string",
        };
        assert_eq!(
            conflict.to_string(),
            ".spec.group: cannot merge string onto existing map"
        );
        assert_eq!(conflict.path().len(), 2);
    }
}
