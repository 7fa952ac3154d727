use crate::core::models::range::{FrameRange, RangeError};
use crate::core::scoring::config::ScoringConfigError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{param}': {reason}")]
    Invalid { param: &'static str, reason: String },

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error("Scoring configuration: {0}")]
    Scoring(#[from] ScoringConfigError),
}

/// What a worker does when a single frame cannot be read or scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FramePolicy {
    /// Record the frame as skipped in the output and carry on.
    #[default]
    Skip,
    /// Fail the worker.
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub range: FrameRange,
    pub nproc: usize,
    /// A frame is a hit when its score is strictly greater than this.
    pub cutoff: f64,
    pub output_dir: PathBuf,
    pub frame_policy: FramePolicy,
    /// How long the coordinator waits for all workers before naming the stragglers.
    pub supervisor_timeout: Option<Duration>,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    start: Option<u64>,
    end: Option<u64>,
    nproc: Option<usize>,
    cutoff: Option<f64>,
    output_dir: Option<PathBuf>,
    frame_policy: Option<FramePolicy>,
    supervisor_timeout: Option<Duration>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }
    pub fn end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }
    pub fn nproc(mut self, nproc: usize) -> Self {
        self.nproc = Some(nproc);
        self
    }
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }
    pub fn frame_policy(mut self, policy: FramePolicy) -> Self {
        self.frame_policy = Some(policy);
        self
    }
    pub fn supervisor_timeout(mut self, timeout: Duration) -> Self {
        self.supervisor_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let start = self.start.unwrap_or(1);
        let end = self.end.ok_or(ConfigError::MissingParameter("end"))?;
        let range = FrameRange::new(start, end)?;

        let nproc = self.nproc.unwrap_or(1);
        if nproc == 0 {
            return Err(ConfigError::Invalid {
                param: "nproc",
                reason: "at least one worker is required".to_string(),
            });
        }

        let cutoff = self.cutoff.ok_or(ConfigError::MissingParameter("cutoff"))?;
        if !cutoff.is_finite() {
            return Err(ConfigError::Invalid {
                param: "cutoff",
                reason: format!("must be a finite number, got {}", cutoff),
            });
        }

        if self.supervisor_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid {
                param: "supervisor_timeout",
                reason: "must be longer than zero".to_string(),
            });
        }

        Ok(RunConfig {
            range,
            nproc,
            cutoff,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            frame_policy: self.frame_policy.unwrap_or_default(),
            supervisor_timeout: self.supervisor_timeout,
        })
    }
}
