//! Public facade crate for `serpdiff`.
//!
//! This crate intentionally contains no IO or engine-specific logic.
//! It re-exports the backend-agnostic types/traits from `serpdiff-core`.

pub use serpdiff_core::*;
