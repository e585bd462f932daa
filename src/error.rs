use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum EnaError {
    #[error("invalid taxonomy operator: {0}")]
    InvalidOperator(String),

    #[error("invalid output format: {0}")]
    InvalidFormat(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("ENA request failed: {0}")]
    EnaHttp(String),

    #[error("ENA returned status {status}: {message}")]
    EnaStatus { status: u16, message: String },

    #[error("failed to read ENA response stream: {0}")]
    Stream(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("cannot generate summary: file {0} not found")]
    SummaryMissingFile(PathBuf),

    #[error("failed to read output file for summary: {0}")]
    SummaryParse(String),

    #[error("missing columns for summary: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("smoke check failed: {0}")]
    CheckFailed(String),
}

impl EnaError {
    /// Status code carried by an HTTP failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EnaError::EnaStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
