//! Error types for translation jobs

use thiserror::Error;

/// Failure of a single translation job.
///
/// Every exit path out of [`crate::Orchestrator::translate`] either returns an
/// artifact or exactly one of these.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Empty source PDF file.")]
    EmptyInput,

    #[error("Invalid language token.")]
    InvalidLanguageToken,

    #[error("BabelDOC binary not found: {0}")]
    BinaryNotFound(String),

    #[error("BabelDOC translation timed out.")]
    TimedOut(u64),

    #[error("{0}")]
    NonZeroExit(String),

    #[error("No translated PDF produced by BabelDOC.")]
    NoOutput,

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the job was rejected before the engine was spawned because
    /// of caller-supplied input.
    pub fn is_input_error(&self) -> bool {
        matches!(self, EngineError::EmptyInput | EngineError::InvalidLanguageToken)
    }
}
