//! File validation utilities for ensuring files are suitable for mapping.
//!
//! Checks run before a file is memory-mapped as a
//! [`ByteSource`](crate::source::ByteSource), so failures surface as
//! synchronous construction errors rather than faults deep inside a scan.

use crate::error::{LineSeekError, Result};
use std::fs::File;
use std::path::Path;

/// Validate that a file path is accessible and suitable for processing
///
/// # Validations Performed
/// - Path exists and is a regular file (not a directory)
/// - File is readable by the current process
/// - File is not empty (an empty mapping is useless and some platforms
///   reject it)
pub fn validate_file_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(LineSeekError::file_error(
            format!("File does not exist: {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "File not found"),
        ));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| LineSeekError::file_error("Failed to read file metadata", e))?;

    if !metadata.is_file() {
        return Err(LineSeekError::file_error(
            format!("Path is not a file: {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Not a file"),
        ));
    }

    if metadata.len() == 0 {
        return Err(LineSeekError::file_error(
            format!("File is empty: {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidData, "Empty file"),
        ));
    }

    // Verify read permissions up front.
    File::open(path).map_err(|e| LineSeekError::file_error("Cannot open file for reading", e))?;

    Ok(())
}
