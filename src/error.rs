//! Error types and handling infrastructure for lineseek.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types, with `anyhow` reserved for the binary's top level.
//!
//! Propagation policy: construction-time and pool errors are raised synchronously
//! to the immediate caller; scan and decode errors propagate as failed futures.
//! Nothing is retried automatically.

use std::time::Duration;
use thiserror::Error;

/// The main error type for lineseek operations.
#[derive(Error, Debug)]
pub enum LineSeekError {
    /// File system related errors (file not found, permission denied, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Worker pool is at its size limit and no idle worker is available.
    /// Fatal to the failed acquire, not to the pool.
    #[error("Worker pool exhausted: all {max_workers} workers are occupied")]
    PoolExhausted { max_workers: usize },

    /// Acquire attempted after the pool was shut down.
    #[error("Worker pool is closed")]
    PoolClosed,

    /// No matching reply arrived within the deadline. The worker's
    /// computation is not cancelled; only the wait is abandoned.
    #[error("Worker call timed out after {timeout:?}")]
    RpcTimeout { timeout: Duration },

    /// A separator pattern whose byte width is neither 1 nor 2 was supplied.
    /// Indicates a logic error; never produced by the three supported kinds.
    #[error("Unsupported line separator width: {width} bytes")]
    UnsupportedSeparatorWidth { width: usize },

    /// Access to line counts or fragments before indexing completed.
    #[error("Reader is not loaded yet")]
    NotLoaded,

    /// Invalid command or call arguments
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A worker task failed or disappeared while a call was outstanding.
    #[error("Worker failure: {message}")]
    WorkerError { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for lineseek operations.
pub type Result<T> = std::result::Result<T, LineSeekError>;

impl LineSeekError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a WorkerError with a descriptive message
    pub fn worker(message: impl Into<String>) -> Self {
        Self::WorkerError {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

// Automatic conversion from io::Error to LineSeekError
impl From<std::io::Error> for LineSeekError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let exhausted = LineSeekError::PoolExhausted { max_workers: 4 };
        assert_eq!(
            exhausted.to_string(),
            "Worker pool exhausted: all 4 workers are occupied"
        );

        let width = LineSeekError::UnsupportedSeparatorWidth { width: 3 };
        assert_eq!(
            width.to_string(),
            "Unsupported line separator width: 3 bytes"
        );

        let timeout = LineSeekError::RpcTimeout {
            timeout: Duration::from_secs(30),
        };
        assert!(timeout.to_string().contains("timed out"));
    }

    #[test]
    fn test_error_constructors() {
        let invalid = LineSeekError::invalid_argument("length must be greater than 0");
        matches!(invalid, LineSeekError::InvalidArgument { .. });

        let worker = LineSeekError::worker("task exited");
        matches!(worker, LineSeekError::WorkerError { .. });
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: LineSeekError = io_err.into();

        match err {
            LineSeekError::FileError { message, .. } => {
                assert_eq!(message, "File not found");
            }
            _ => panic!("Expected FileError variant"),
        }
    }
}
