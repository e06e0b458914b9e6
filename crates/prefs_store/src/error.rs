use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefsStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse preferences JSON at {path}: {source}")]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize preferences for {path}: {source}")]
    JsonSerialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("preferences file {path} has unsupported version {found}; expected 1")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("preferences file {path} has invalid RFC3339 timestamp in 'updated_at': {value}")]
    InvalidTimestamp { path: PathBuf, value: String },

    #[error("no user configuration directory is available on this platform")]
    MissingConfigDir,

    #[error("failed to format current UTC timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl PrefsStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn json_serialize(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::JsonSerialize {
            path: path.into(),
            source,
        }
    }
}
