use super::config::ScoringConfig;
use crate::core::models::frame::Frame;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Scoring engine initialization failed: {0}")]
    Initialization(String),
    #[error("Frame rejected by scoring engine: {0}")]
    Rejected(String),
    #[error("Scoring engine failure: {0}")]
    Engine(String),
}

/// One reflection found on a frame, in detector pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spot {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

/// Per-frame statistics returned by a scoring context.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameScore {
    pub spot_count: u32,
    pub score3: f64,
    /// Resolution limit (Å) at which 90% of the spots are found.
    pub resolution_limit: f64,
    /// Reflection list; engines that do not report one leave it empty.
    pub spots: Vec<Spot>,
}

impl FrameScore {
    #[inline]
    pub fn is_hit(&self, cutoff: f64) -> bool {
        self.score3 > cutoff
    }
}

/// The first phase of the scoring boundary.
///
/// `initialize` loads the expensive per-run calibration state and is called exactly
/// once per worker, on the worker's own thread. The returned context is owned by that
/// worker and is never shared, so it does not need to be `Send` or `Sync`.
pub trait ScoringEngine: Send + Sync {
    type Context: ScoringContext;

    fn initialize(&self, config: &ScoringConfig) -> Result<Self::Context, ScoringError>;
}

/// The second phase of the scoring boundary: repeatable per-frame processing.
pub trait ScoringContext {
    fn process(&mut self, frame: &Frame) -> Result<FrameScore, ScoringError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_requires_score_strictly_above_cutoff() {
        let score = FrameScore {
            spot_count: 12,
            score3: 5.0,
            resolution_limit: 2.1,
            spots: Vec::new(),
        };
        assert!(!score.is_hit(5.0));
        assert!(score.is_hit(4.99));
    }
}
