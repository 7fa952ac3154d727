use std::path::PathBuf;
use sxhit::engine::error::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit status: 2 when some workers failed, 1 for anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(EngineError::PartialFailure { .. }) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_maps_to_exit_code_two() {
        let err = CliError::from(EngineError::PartialFailure {
            failed: vec![],
            total: 3,
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(CliError::Config("bad".into()).exit_code(), 1);
        assert_eq!(CliError::from(EngineError::Cancelled).exit_code(), 1);
    }
}
