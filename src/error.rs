//! Error types shared across the pipeline.
//!
//! Structural failures (a malformed input row, a feature without
//! coordinates) abort the run and are reported through [`TatatError`].
//! Per-sequence failures such as an untranslatable codon are recovered by the
//! caller and only show up in aggregate counters.

use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Error, Debug)]
pub enum TatatError {
    /// An input row or record that does not have the expected shape.
    #[error("Malformed record in {file} (line {line}): {reason}")]
    MalformedRecord {
        file: String,
        line: usize,
        reason: String,
    },

    /// A feature id referenced downstream has no coordinate metadata.
    #[error("No coordinates found for feature id {id}")]
    MissingCoordinate { id: String },
}

impl TatatError {
    pub fn malformed(file: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        TatatError::MalformedRecord {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }
}
