//! Data models for frames, masks and frame-index ranges.

pub mod frame;
pub mod mask;
pub mod range;
