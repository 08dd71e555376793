//! Error types for manifest generation.

use crate::merge::MergeConflict;
use crate::schema::SchemaError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error is a single failure of a run, a CRD or a generated tuple.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown feature set {name:?}; expected one of Default, TechPreviewNoUpgrade, CustomNoUpgrade")]
    UnknownFeatureSet { name: String },

    #[error("failed to load enabled feature gates for {feature_set} from {}: {message}", .path.display())]
    ConfigLoad {
        feature_set: String,
        path: PathBuf,
        message: String,
    },

    #[error("{crd}: {message}")]
    FilenameTemplate { crd: String, message: String },

    #[error("{crd} ({target}): merge conflict at {source}")]
    MergeConflict {
        crd: String,
        target: String,
        #[source]
        source: MergeConflict,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: failed to parse: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{}: {message}", .path.display())]
    Annotation { path: PathBuf, message: String },

    #[error("{}: failed to serialize: {message}", .path.display())]
    Serialize { path: PathBuf, message: String },

    #[error("{} is out of date, rerun generate:\n{diff}", .path.display())]
    VerifyMismatch { path: PathBuf, diff: String },

    #[error("{} is produced by both {first} and {second}", .path.display())]
    DuplicateOutput {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("invalid tuple overrides: {message}")]
    InvalidOverrides { message: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that should stop the whole run rather than one CRD.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnknownFeatureSet { .. }
                | Error::ConfigLoad { .. }
                | Error::InvalidOverrides { .. }
                | Error::Schema(_)
        )
    }
}

/// Errors is an ordered collection of errors gathered across a run.
#[derive(Debug, Default)]
pub struct Errors {
    errors: Vec<Error>,
}

impl Errors {
    pub fn new() -> Self {
        Errors { errors: Vec::new() }
    }

    pub fn add(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: Errors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// Returns Ok(()) when nothing was collected.
    pub fn into_result(self) -> Result<(), Errors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Errors {
            errors: vec![error],
        }
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}
