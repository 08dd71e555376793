//! # CRD Manifest Merge
//!
//! Generates installable CustomResourceDefinition manifests from partial
//! manifests gated behind feature gates.
//!
//! Every CRD ships one or more partial documents. For each feature set the
//! partials whose gates are enabled are folded together with an apply-style
//! structural merge, post-processed and written out. A verify mode compares
//! the result with committed files instead of writing them.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of YAML/JSON documents
//! - [`fieldpath`] - Paths naming a location inside a document
//! - [`schema`] - Merge schema language and the built-in CRD schema
//! - [`merge`] - Structural merge of two documents
//! - [`featuregate`] - Feature sets and their enabled gates
//! - [`manifest`] - Partial manifests and the filters selecting them
//! - [`generator`] - Per feature set generation, output and verification
//! - [`error`] - Error types

pub mod error;
pub mod featuregate;
pub mod fieldpath;
pub mod generator;
pub mod manifest;
pub mod merge;
pub mod schema;
pub mod value;

pub use error::{Error, Errors, Result};
pub use featuregate::{FeatureSet, FeatureSetResolver};
pub use fieldpath::{Path, PathElement};
pub use generator::{Generator, GeneratorOptions, OutputWriter, Report, TupleOverrides};
pub use manifest::{ManifestFilter, PartialManifest};
pub use merge::{MergeConflict, Merger};
pub use schema::Schema;
pub use value::Value;
