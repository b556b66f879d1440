use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration problems. All of these are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("cannot read target file {path}: {source}")]
    TargetFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed target file {path}: {source}")]
    TargetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("target #{index} ({name}) is invalid: {reason}")]
    InvalidTarget {
        index: usize,
        name: String,
        reason: String,
    },
}

/// Failures talking to the remote sheet. The writer retries every variant.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid sheets URL: {0}")]
    Url(String),

    #[error("{0}")]
    Other(String),
}

/// Every write attempt for a batch failed; nothing was persisted.
#[derive(Debug, Error)]
#[error("batch of {rows} rows not written after {attempts} attempts, last error: {last}")]
pub struct WriteError {
    pub rows: usize,
    pub attempts: u32,
    pub last: SheetError,
}

impl SheetError {
    /// `addSheet` rejected because a tab called `title` already exists,
    /// typically created by a concurrent writer. A clashing sheet id is not this.
    pub fn is_duplicate_title(&self, title: &str) -> bool {
        match self {
            SheetError::Api { status, message } => {
                *status == 400
                    && message.to_ascii_lowercase().contains("already exists")
                    && message.contains(&format!("name \"{title}\""))
            }
            _ => false,
        }
    }
}
