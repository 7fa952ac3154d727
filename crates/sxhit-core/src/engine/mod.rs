//! # Engine Module
//!
//! The logic core of the hit-finding driver.
//!
//! ## Overview
//!
//! A run is decided statically before any worker starts: the frame range is split into
//! disjoint per-worker sub-ranges, each sub-range is mapped onto the containers that
//! hold it, and every worker then streams its frames through the transform pipeline
//! into its own scoring context. Results are collected once per worker and aggregated
//! into a report.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Partitioning** ([`partition`]) - Static split of a frame range across workers
//! - **Index Resolution** ([`resolver`]) - Pure global index ↔ container arithmetic
//! - **Frame Transform** ([`transform`]) - Depth normalization and defect masking
//! - **Workers** ([`worker`]) - The per-worker state machine and output stream
//! - **Aggregation** ([`aggregate`]) - Write-once result collection and run report
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Cancellation** ([`cancel`]) - Cooperative stop signal checked between frames
//! - **Error Handling** ([`error`]) - Engine error taxonomy

pub mod aggregate;
pub mod cancel;
pub mod config;
pub mod error;
pub mod partition;
pub mod progress;
pub mod resolver;
pub mod transform;
pub mod worker;
