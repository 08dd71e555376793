//! Field path module - Names locations inside a document.
//!
//! Paths are used to report where two partial manifests disagree.

mod path;

pub use path::*;
