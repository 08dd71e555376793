//! Manifest module - Partial CRD manifests, their annotations and filters.

mod annotations;
mod filter;
mod partial;

pub use annotations::*;
pub use filter::*;
pub use partial::*;
