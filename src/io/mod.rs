//! Score export.

pub mod export;
