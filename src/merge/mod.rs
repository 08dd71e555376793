//! Merge module - Apply-style structural merge of partial documents.
//!
//! Overlays are applied one at a time on top of an accumulated document,
//! with list handling driven by the schema.

mod conflict;
mod merger;


pub use conflict::*;
pub use merger::*;
