//! Error types for ar-courier
//!
//! This module provides the error taxonomy of the library:
//! - Validation errors (bad CPF/CNPJ, reported before a batch starts)
//! - Encoding errors (missing or malformed batch fields, no partial file)
//! - Staging errors (local file write/read)
//! - Transfer errors (connect, timeout, protocol failures during upload)
//! - Registration errors (upstream token exchange / include request)
//!
//! A cancelled upload is not an error; it is a terminal
//! [`TransferState`](crate::types::TransferState).

use crate::document::DocumentKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ar-courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ar-courier
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "FTP_SERVER_HOST")
        key: Option<String>,
    },

    /// Recipient document number failed checksum validation
    #[error("the {kind} {document} is not valid")]
    InvalidDocument {
        /// The document as supplied by the caller
        document: String,
        /// The document kind guessed from its digit count
        kind: DocumentKind,
    },

    /// Batch could not be encoded
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// Staged file could not be written or read
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    /// Upload to the remote storage failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Upstream registration API failed
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Batch encoding errors
///
/// Raised before any line of the offending record is emitted.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A required field was empty
    #[error("missing required field {field} in {record}")]
    MissingField {
        /// Which structure the field belongs to (e.g., "batch context", "recipient")
        record: &'static str,
        /// Field name
        field: &'static str,
    },

    /// A field had a value the layout cannot hold
    #[error("invalid value {value:?} for field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// The offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Local staging file errors
#[derive(Debug, Error)]
pub enum StagingError {
    /// Staging directory could not be created
    #[error("failed to create staging directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Staged file could not be written
    #[error("failed to write staged file {path}: {source}")]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File could not be opened or read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Remote transfer errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// TCP connection to the storage server failed
    #[error("could not connect to {address}: {reason}")]
    Connect {
        /// host:port that was dialed
        address: String,
        /// Reason reported by the OS
        reason: String,
    },

    /// A network operation exceeded the configured timeout
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out (e.g., "connect", "STOR")
        operation: String,
        /// The timeout that elapsed
        after: Duration,
    },

    /// Server answered with an unexpected reply
    #[error("{code} {message}")]
    Protocol {
        /// Reply code (e.g., 530)
        code: u16,
        /// Raw reply text from the server
        message: String,
    },

    /// Connection dropped or stream I/O failed
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Another upload for this session has not reached a terminal state
    #[error("an upload is already in progress for session {session}")]
    UploadInProgress {
        /// Session identifier
        session: String,
    },
}

/// Upstream registration API errors
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// OAuth token could not be obtained
    #[error("could not obtain the access token: {0}")]
    TokenUnavailable(String),

    /// The API refused the registration
    #[error("registration rejected ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the API
        status: u16,
        /// Message returned by the API
        message: String,
    },

    /// The API answered with a body we cannot map to a shipment
    #[error("malformed registration response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether the failure happened before anything was handed to the transfer pipeline
    pub fn is_pre_transfer(&self) -> bool {
        !matches!(self, Error::Transfer(_))
    }
}

/// Convert errors to HTTP status codes for the web collaborator
///
/// The web layer is out of scope for this crate; this trait only fixes
/// the mapping so every collaborator reports the same statuses.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 500,
            Error::InvalidDocument { .. } => 422,
            Error::Encoding(_) => 422,
            Error::Staging(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,

            Error::Transfer(TransferError::UploadInProgress { .. }) => 409,
            Error::Transfer(TransferError::Timeout { .. }) => 504,
            Error::Transfer(_) => 502,

            Error::Registration(RegistrationError::TokenUnavailable(_)) => 503,
            Error::Registration(RegistrationError::Rejected { status, .. }) => *status,
            Error::Registration(RegistrationError::MalformedResponse(_)) => 502,
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidDocument { .. } => "invalid_document",
            Error::Encoding(e) => match e {
                EncodingError::MissingField { .. } => "missing_field",
                EncodingError::InvalidField { .. } => "invalid_field",
            },
            Error::Staging(e) => match e {
                StagingError::CreateDir { .. } => "staging_dir_failed",
                StagingError::Write { .. } => "staging_write_failed",
                StagingError::Read { .. } => "read_failed",
            },
            Error::Transfer(e) => match e {
                TransferError::Connect { .. } => "connect_failed",
                TransferError::Timeout { .. } => "timeout",
                TransferError::Protocol { .. } => "protocol_error",
                TransferError::Io(_) => "transfer_io_error",
                TransferError::UploadInProgress { .. } => "upload_in_progress",
            },
            Error::Registration(e) => match e {
                RegistrationError::TokenUnavailable(_) => "token_unavailable",
                RegistrationError::Rejected { .. } => "registration_rejected",
                RegistrationError::MalformedResponse(_) => "malformed_response",
            },
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
