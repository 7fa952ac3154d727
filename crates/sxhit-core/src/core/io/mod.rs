//! Input/output for frame containers, run metadata and defect masks.
//!
//! The on-disk container codec is intentionally minimal ([`raw`]); the rest of the
//! crate only depends on the [`container::ContainerSource`] trait, so a production
//! codec can be plugged in without touching the engine.

pub mod container;
pub mod mask;
pub mod metadata;
pub mod raw;
