//! Error types for the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching, decompressing or merging a dataset.
#[derive(Debug, Error)]
pub enum EtlError {
    /// The remote dataset could not be retrieved.
    #[error("fetch of {url} failed: {message}")]
    Fetch { url: String, message: String },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The downloaded archive could not be decompressed.
    #[error("decompression of {} failed: {source}", path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error propagated from the stores.
    #[error("database error: {0}")]
    Database(#[from] reelstat_core::Error),

    #[error(transparent)]
    Row(#[from] RowParseError),
}

impl EtlError {
    /// Returns `true` for I/O-level failures that a later run may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Request(_) | Self::Decompress { .. } | Self::Io(_)
        )
    }
}

/// A single malformed row. Never fatal to the stream that produced it.
#[derive(Debug, Error)]
pub enum RowParseError {
    #[error("line {line}: expected {expected} columns, found {found}: {payload:?}")]
    MissingColumns {
        line: u64,
        expected: usize,
        found: usize,
        payload: String,
    },

    #[error("line {line}: invalid {column} {value:?}: {payload:?}")]
    Malformed {
        line: u64,
        column: &'static str,
        value: String,
        payload: String,
    },

    #[error("line {line}: read failed: {source}")]
    Io {
        line: u64,
        #[source]
        source: std::io::Error,
    },
}

impl RowParseError {
    /// 1-based line number of the offending row.
    pub fn line(&self) -> u64 {
        match self {
            Self::MissingColumns { line, .. } | Self::Malformed { line, .. } | Self::Io { line, .. } => {
                *line
            }
        }
    }
}

/// Convenience alias for pipeline results.
pub type EtlResult<T> = std::result::Result<T, EtlError>;
