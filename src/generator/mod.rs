//! Generator module - Merged manifest generation per feature set.

mod output;
mod overrides;
mod tuple;

#[cfg(test)]
mod generator_test;

pub use output::*;
pub use overrides::*;
pub use tuple::*;
