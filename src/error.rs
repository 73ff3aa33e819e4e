// src/error.rs
//! Error type shared by the store, the normalization pipeline and the validator.
//!
//! Every variant here is fatal for a run. Recoverable issues (unknown payload
//! sections, continuity gaps, unreadable observations) never become errors;
//! they are reported through [`crate::observe::Observer`] instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Provider;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("path {0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("content hash {0:?} is not a hex digest of at least 6 characters")]
    InvalidHash(String),

    /// A metadata record points at a payload blob that is not on disk.
    #[error("payload {hash} referenced by {meta_path} is missing")]
    MissingPayload { hash: String, meta_path: PathBuf },

    /// No strategy claimed the response; usually an upstream shape change.
    #[error("cannot route response {hash} (url: {url:?})")]
    Unrouted { hash: String, url: Option<String> },

    #[error("payload {hash} is not valid JSON: {source}")]
    Decode {
        hash: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("data point for {date} already belongs to {existing}, not {expected}")]
    ProviderMismatch {
        date: String,
        existing: Provider,
        expected: Provider,
    },

    #[error("data point for {date} has no provider set")]
    MissingProvider { date: String },

    #[error("date key {0:?} is not a YYYY-MM-DD calendar date")]
    InvalidDate(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_message_does_not_assume_a_read() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Json {
            path: PathBuf::from("meta/2025/07/x.json"),
            source,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("JSON error at meta/2025/07/x.json"), "{msg}");
        assert!(!msg.contains("malformed"));
    }
}
