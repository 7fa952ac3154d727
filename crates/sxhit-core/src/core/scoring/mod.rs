//! The scoring-engine boundary.
//!
//! Scoring is modelled as a two-phase, context-based interface: an engine is
//! initialized once per worker from a [`config::ScoringConfig`] and the resulting
//! context then processes many frames. [`threshold`] provides a bundled engine used
//! when no native engine is plugged in.

pub mod config;
pub mod engine;
pub mod threshold;
