//! Core types for ar-courier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one interactive client session
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload state of one session's transfer pipeline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// No upload started yet
    #[default]
    Idle,
    /// Opening the remote session
    Connecting,
    /// Sending chunks
    Transferring,
    /// All bytes stored and session closed
    Completed,
    /// Transport error; nothing is retried
    Failed,
    /// Aborted on request; the partial remote file was deleted (best effort)
    Cancelled,
}

impl TransferState {
    /// Whether the state is final for the current upload
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Cancelled
        )
    }

    /// Whether a new upload may start from this state
    pub fn accepts_upload(&self) -> bool {
        *self == TransferState::Idle || self.is_terminal()
    }
}

/// Event delivered to one client session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Busy indicator with an optional progress percentage
    Loader {
        /// Status message
        message: String,
        /// Progress percentage (0 to 100)
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<u8>,
    },

    /// Upload progress
    Progress {
        /// Progress percentage (0 to 100)
        progress: u8,
    },

    /// Upload finished
    Success {
        /// Registration data echoed back to the client
        payload: serde_json::Value,
        /// Status message
        message: String,
    },

    /// Upload failed
    UploadError {
        /// Dialog title
        title: String,
        /// Server or protocol error text
        message: String,
    },

    /// Batch could not be prepared
    Error {
        /// Dialog title
        title: String,
        /// Error message
        message: String,
    },

    /// Recipient document failed validation
    InvalidDocument {
        /// Error message
        message: String,
    },
}

impl Event {
    /// Name of the event on the client channel
    pub fn name(&self) -> &'static str {
        match self {
            Event::Loader { .. } => "loader",
            Event::Progress { .. } => "upload_progress",
            Event::Success { .. } => "success",
            Event::UploadError { .. } => "upload_error",
            Event::Error { .. } => "error",
            Event::InvalidDocument { .. } => "invalid document",
        }
    }

    /// Shorthand for a loader event without progress
    pub fn loader(message: impl Into<String>) -> Self {
        Event::Loader {
            message: message.into(),
            progress: None,
        }
    }
}

/// An event addressed to a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Recipient session
    pub session: SessionId,
    /// The event
    pub event: Event,
}
