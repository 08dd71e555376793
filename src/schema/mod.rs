//! Schema module defines the small type language that drives merges.
//!
//! A schema tells the merger, per field, whether a list is atomic, keyed or
//! a set, and whether a map is merged field by field or replaced whole.

mod crd;
mod elements;

pub use crd::{crd_merge_schema, CRD_MERGE_SCHEMA_YAML, CRD_ROOT_TYPE};
pub use elements::*;
