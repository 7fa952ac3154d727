//! # Core Module
//!
//! Foundational building blocks shared by the engine and the workflows.
//!
//! - **Models** ([`models`]) - Frame ranges, raw and normalized frames, defect masks.
//! - **I/O** ([`io`]) - The raw container codec, container sources, run metadata and the
//!   mask loader.
//! - **Scoring** ([`scoring`]) - The two-phase scoring-engine boundary, the configuration
//!   artifact handed to it, and a bundled reference engine.
//!
//! Nothing in this module spawns threads or holds run-level state.

pub mod io;
pub mod models;
pub mod scoring;
