//! Public facade crate for `spanmark`.
//!
//! This crate intentionally contains no matching logic of its own. It
//! re-exports the representation-agnostic types/traits from
//! `spanmark-core` and the localization engine from `spanmark-engine`.

pub use spanmark_core::*;
pub use spanmark_engine as engine;
