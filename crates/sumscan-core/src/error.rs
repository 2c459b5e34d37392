//! Error types for the sumscan-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! detailed variants for the different failure modes of a scan.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sumscan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all sumscan operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a match to an output sink
    ///
    /// Match writes are the unit of durability for a scan, so a failed
    /// write terminates the whole run.
    #[error("failed to write to {sink} output: {source}")]
    SinkWrite {
        /// Which output channel failed ("match" or "structure")
        sink: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A defined structure names a checksum type this build cannot evaluate
    #[error("unsupported checksum type: '{kind}'")]
    UnsupportedChecksumType {
        /// The offending type string
        kind: String,
    },

    /// A defined-structure record failed validation
    #[error("invalid structure definition: {details}")]
    StructureConfig {
        /// Description of what was wrong with the record
        details: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new sink write error
    pub fn sink_write(sink: &'static str, source: std::io::Error) -> Self {
        Self::SinkWrite { sink, source }
    }

    /// Creates a new unsupported checksum type error
    pub fn unsupported_checksum(kind: impl Into<String>) -> Self {
        Self::UnsupportedChecksumType { kind: kind.into() }
    }

    /// Creates a new structure configuration error
    pub fn structure_config(details: impl Into<String>) -> Self {
        Self::StructureConfig {
            details: details.into(),
        }
    }

    /// Returns true if this is a recoverable error that degrades one
    /// structure rather than aborting the scan
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedChecksumType { .. } | Self::StructureConfig { .. }
        )
    }
}
