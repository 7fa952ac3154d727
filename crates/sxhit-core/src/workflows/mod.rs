//! # Workflows Module
//!
//! High-level entry points that drive a complete hit-finding run.
//!
//! ## Overview
//!
//! A workflow takes already-loaded inputs (a container source, a scoring engine, the
//! scoring configuration and an optional mask) together with a [`RunConfig`], and
//! returns a report. Front ends are responsible for loading those inputs and for
//! deciding what a partial failure means for their exit status.
//!
//! ## Architecture
//!
//! - **Hit Finding** ([`hitfind`]) - Partition, spawn one worker per sub-range,
//!   supervise their completion and aggregate the per-worker results.
//!
//! [`RunConfig`]: crate::engine::config::RunConfig

pub mod hitfind;
