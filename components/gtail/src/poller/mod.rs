//! Incremental fetch protocol: window selection, deduplication and adaptive delay.

pub mod delay;
pub mod fetcher;
pub mod window;
