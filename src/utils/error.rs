//! Error types for the compression subsystem.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.
//! Cancellation has no variant here: a cancelled job is an outcome, not an error.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use serde::Serialize;

/// Validation errors for jobs and settings.
///
/// Always reported synchronously, before any worker thread is involved.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    /// Path-related validation error
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    /// Invalid settings error
    #[error("Settings error: {0}")]
    Settings(String),
    /// Invalid job parameters
    #[error("Job error: {0}")]
    Job(String),
}

/// File path errors.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum PathError {
    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// Path exists but is not a file
    #[error("Not a file: {0}")]
    NotFile(PathBuf),
    /// Destination is already taken and overwriting was not requested
    #[error("Destination already exists: {0}")]
    AlreadyExists(PathBuf),
    /// IO error accessing the path
    #[error("IO error: {0}")]
    IO(String),
}

/// Failures reported by the codec collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CodecError {
    /// Source bytes could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),
    /// Encoding at the requested parameters failed
    #[error("Encode failed: {0}")]
    Encode(String),
    /// Format or option the codec cannot produce
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Failures of the target-size search itself.
///
/// Distinct from "target not met", which is a successful search result.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum OptimizerError {
    /// Called without a positive byte budget
    #[error("Target size must be greater than zero")]
    NoTarget,
    /// Too many consecutive codec failures
    #[error("Codec failed {count} times in a row: {last}")]
    CodecFailures { count: u32, last: CodecError },
    /// The attempt budget ran out without a single encoded output
    #[error("No encode succeeded in {attempts} attempts: {last}")]
    NoSuccessfulAttempt { attempts: u32, last: CodecError },
}

/// Main error type for compression jobs.
///
/// All job-level failures are converted to this type and carried back to the
/// submitter inside the job's report.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum CompressError {
    /// Job or input validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The codec collaborator failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The target-size search aborted
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    /// File IO error
    #[error("IO error: {0}")]
    IO(String),
}

/// Convenience result type for compression operations.
pub type CompressResult<T> = Result<T, CompressError>;

impl CompressError {
    pub fn io<T: Into<String>>(msg: T) -> Self {
        Self::IO(msg.into())
    }

    /// Short machine-readable category, used in progress metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Codec(_) => "codec",
            Self::Optimizer(_) => "optimizer",
            Self::IO(_) => "io",
        }
    }
}

// Helper methods for validation error creation
impl ValidationError {
    pub fn path_not_found(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFound(path.into()))
    }

    pub fn not_a_file(path: impl Into<PathBuf>) -> Self {
        Self::Path(PathError::NotFile(path.into()))
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Self::Job(msg.into())
    }
}

impl CodecError {
    pub fn decode<T: ToString>(err: T) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn encode<T: ToString>(err: T) -> Self {
        Self::Encode(err.to_string())
    }
}

// Convert std::io::Error to CompressError
impl From<io::Error> for CompressError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert io::Error to PathError
impl From<io::Error> for PathError {
    fn from(err: io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

// Convert PathError to CompressError
impl From<PathError> for CompressError {
    fn from(err: PathError) -> Self {
        Self::Validation(ValidationError::Path(err))
    }
}
