//! Terminal output.

#[allow(clippy::module_inception)]
pub mod render;
