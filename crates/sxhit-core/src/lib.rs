//! # sxhit Core Library
//!
//! An offline, parallel hit-finding driver for serial-crystallography diffraction frames
//! stored across chunked container files.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that the index arithmetic, the
//! per-frame pipeline and the orchestration can be tested in isolation.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`FrameRange`, `Frame`, `Mask`),
//!   the container and mask readers, and the scoring-engine boundary together with the
//!   builder for its configuration artifact.
//!
//! - **[`engine`]: The Logic Core.** Range partitioning, container-index resolution, the
//!   frame transform (depth normalization and masking), the worker state machine and the
//!   write-once result aggregation.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into a complete
//!   run: plan the jobs, spawn one worker per job, supervise them and aggregate a report.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod test_utils;
