use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors opening or running a capture session.
///
/// All of these are fatal at startup: there is no recovery path when no
/// capturable interface exists.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No capture interface matches {0}")]
    InterfaceNotFound(String),

    #[error("Insufficient permissions to capture (run as root or grant CAP_NET_RAW)")]
    InsufficientPermissions,

    #[error("Failed to create capture channel: {0}")]
    ChannelCreation(String),

    #[error("Capture session is already open")]
    AlreadyOpen,

    #[error("Capture session is not open")]
    NotOpen,
}

/// Errors delivering a batch to the ingestion service.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Ingestion service rejected batch: HTTP {status}")]
    Rejected { status: u16 },
}

/// Errors reading or writing the packet store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt store record at {path:?} line {line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Packet id {0} already stored")]
    DuplicateId(u32),

    #[error("Duplicate packet id {id} at {path:?} line {line}")]
    DuplicateRecord { path: PathBuf, line: usize, id: u32 },

    #[error("Store file {0:?} is locked by another process")]
    Locked(PathBuf),

    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the error concerns one record rather than the store itself.
    pub fn is_record_level(&self) -> bool {
        matches!(self, StoreError::DuplicateId(_) | StoreError::Serialize(_))
    }
}

/// Errors coercing an ingested payload into a packet record.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    #[error("Field '{field}' is not an integer: {value}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("Field '{field}' is not an IPv4 address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Unsupported protocol: {0}")]
    InvalidProtocol(String),
}

/// Errors loading configuration from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Errors surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Store(StoreError::Unavailable(msg)) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        tracing::error!("{}: {}", status, message);
        (status, message).into_response()
    }
}
