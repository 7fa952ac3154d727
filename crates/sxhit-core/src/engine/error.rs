use super::config::ConfigError;
use crate::core::io::container::ContainerError;
use crate::core::io::mask::MaskError;
use crate::core::io::metadata::MetadataError;
use crate::core::models::frame::Shape;
use crate::core::scoring::engine::ScoringError;
use std::path::PathBuf;
use thiserror::Error;

/// One worker that did not complete, as listed in a partial-failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker_id: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Container access failed: {0}")]
    ContainerAccess(#[from] ContainerError),

    #[error("Mask shape {expected} does not match frame shape {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    #[error("Scoring engine initialization failed: {0}")]
    EngineInit(#[source] ScoringError),

    #[error("Scoring failed on frame {frame}: {source}")]
    Scoring {
        frame: u64,
        #[source]
        source: ScoringError,
    },

    #[error("Failed to write '{path}': {source}", path = path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mask error: {0}")]
    Mask(#[from] MaskError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("{count} of {total} worker(s) did not complete", count = failed.len())]
    PartialFailure {
        failed: Vec<WorkerFailure>,
        total: usize,
    },

    #[error("Run was cancelled")]
    Cancelled,

    #[error("Internal logic error: {0}")]
    Internal(String),
}

/// A failure that ended a worker, tagged with the worker and the frame in progress.
#[derive(Debug, Error)]
#[error("Worker {worker_id} failed{at}: {source}", at = describe_frame(*frame))]
pub struct WorkerError {
    pub worker_id: usize,
    pub frame: Option<u64>,
    pub source: EngineError,
}

fn describe_frame(frame: Option<u64>) -> String {
    frame.map(|f| format!(" at frame {}", f)).unwrap_or_default()
}
