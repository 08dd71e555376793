//! Feature gate module - Feature set names and their enabled gates.

mod feature_set;
mod resolver;

pub use feature_set::*;
pub use resolver::*;
