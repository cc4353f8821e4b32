//! Stream name resolution.

pub mod directory;
