use std::io;

use thiserror::Error;

/// Result alias used throughout the benchmark.
pub type Result<T> = std::result::Result<T, GioError>;

/// Benchmark error type, one variant per failure class.
#[derive(Debug, Error)]
pub enum GioError {
    /// Missing or inconsistent options, non-divisible group, bad payload size
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Memory could not be obtained
    #[error("resource error: {0}")]
    Resource(String),

    /// A private-file operation failed after exhausting its retries
    #[error("{op} {path}: {source}")]
    LocalIo {
        op: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    /// A group-wide MPI call returned a non-success code
    #[error("{op} failed (MPI error code {code})")]
    Collective { op: &'static str, code: i32 },

    /// Read-back content did not match what was written
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// First mismatching element found while validating a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("validation failed at element {index}: expected {expected}, found {actual}")]
pub struct ValidationError {
    pub index: usize,
    pub expected: i32,
    pub actual: i32,
}

impl GioError {
    pub fn config(msg: impl Into<String>) -> Self {
        GioError::Configuration(msg.into())
    }

    pub fn local_io(op: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        GioError::LocalIo {
            op,
            path: path.into(),
            source,
        }
    }

    /// Check an MPI return code; `MPI_SUCCESS` is zero in every implementation.
    pub fn check_mpi(op: &'static str, code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(GioError::Collective { op, code })
        }
    }

    /// True for errors every rank detects identically, before any shared I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, GioError::Configuration(_))
    }
}
