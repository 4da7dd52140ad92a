use thiserror::Error;

use run_tracker_lib::geo_point::GeoPoint;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the session executor has shut down")]
    Closed,
    #[error("the {0} queue is full")]
    QueueFull(&'static str),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    #[error("invalid coordinate {0:?}")]
    InvalidCoordinate(GeoPoint),
    #[error("conversion timed out after {0} ms")]
    Timeout(u64),
    #[error("conversion failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config line {line}: {text:?}")]
    Malformed { line: usize, text: String },
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
