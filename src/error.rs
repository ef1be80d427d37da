//! Error handling for matched-filter operations.
//!
//! Provides error types with context for template construction, archive
//! loading, and detection runs. Every failure here is local and synchronous:
//! nothing is retried internally.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchFilterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] serde_json::Error),

    #[error("Invalid name: '{name}' - Must satisfy the regex '{pattern}'")]
    InvalidName { name: String, pattern: String },

    #[error("Sampling rates do not match in data: {channel} is sampled at {found} Hz, expected {expected} Hz")]
    SamplingRateMismatch {
        channel: String,
        expected: f64,
        found: f64,
    },

    #[error("Multiple templates in file: {path} holds {count} templates")]
    ArchiveCardinality { path: PathBuf, count: usize },

    #[error("Method '{method}' is not supported, use Tribe::construct instead")]
    UnsupportedConstruction { method: String },

    #[error(
        "Insufficient data for {channel}: {present:.1}% of samples present in window starting {window_start} (use ignore_length to skip this check)"
    )]
    InsufficientData {
        channel: String,
        present: f64,
        window_start: String,
    },

    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("Template generation failed: {reason}")]
    Generation { reason: String },

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },
}

impl MatchFilterError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create a processing interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MatchFilterError>;
