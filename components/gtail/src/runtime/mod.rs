//! The tail loop.

#[allow(clippy::module_inception)]
pub mod runtime;
