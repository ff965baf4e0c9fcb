//! Error types for feedsim ingestion
//!
//! Every failure is classified by how far it reaches:
//!
//! - [`ErrorScope::Traversal`]: listing or session failures abort the whole
//!   source; they are the only errors that make a run fail.
//! - [`ErrorScope::Object`]: everything else aborts the object being
//!   processed and is logged by the worker that hit it.
//!
//! Recoverable per-line problems are not errors at all; the parser reports
//! them as [`crate::parser::LineOutcome::Skipped`].

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// How far an error propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Aborts the traversal of the whole source
    Traversal,
    /// Aborts a single object's task
    Object,
}

/// A line that could not be decoded and must not be skipped
#[derive(Error, Debug)]
pub enum MalformedRecord {
    #[error("invalid JSON record: {0}")]
    Json(#[source] serde_json::Error),

    #[error("invalid delimited record: {0}")]
    Csv(#[source] csv::Error),

    #[error("line is not valid UTF-8: {0}")]
    Encoding(#[source] std::str::Utf8Error),
}

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to list s3://{bucket}/{prefix}: {message}")]
    Listing {
        bucket: String,
        prefix: String,
        message: String,
    },

    #[error("Object store session error: {0}. Check the region and AWS credentials.")]
    Session(String),

    #[error("Failed to download s3://{bucket}/{key}: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Failed to decompress {key}: {source}")]
    Decompression {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line} of {key} is longer than {limit} bytes")]
    LineTooLong { key: String, line: usize, limit: usize },

    #[error("Malformed record at line {line} of {key}: {source}")]
    Malformed {
        key: String,
        line: usize,
        #[source]
        source: MalformedRecord,
    },

    #[error("Failed to build insert statement for table '{table}': {reason}")]
    Statement { table: String, reason: String },

    #[error("Failed to insert into table '{table}': {source}")]
    Database {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Sink rejected row for table '{table}': {message}")]
    Sink { table: String, message: String },
}

impl IngestError {
    /// Create a statement build error
    pub fn statement(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Statement {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Classify how far this error reaches
    pub fn scope(&self) -> ErrorScope {
        match self {
            IngestError::Listing { .. } | IngestError::Session(_) => ErrorScope::Traversal,
            _ => ErrorScope::Object,
        }
    }
}
