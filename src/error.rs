//! Error types for the pagination library.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Result type alias for pagination operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while managing a pagination session.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The session manifest is malformed.
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    /// A serialized document status breaks the data/error exclusivity rule.
    #[error("Invalid document status: {0}")]
    InvalidStatus(String),

    /// Page index is out of range for the output document.
    #[error("Page index {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),

    /// No output document with the given id exists in the session.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// The page provider does not know the requested source document.
    #[error("Unknown source document: {0}")]
    UnknownSource(String),

    /// Clipboard text is not a recognized transfer payload.
    #[error("Clipboard format error: {0}")]
    ClipboardFormat(String),
}

/// A failure raised by a status computation backend.
///
/// This is the captured failure stored inside an errored
/// [`DocumentStatus`](crate::model::DocumentStatus). The `$type` tag keeps the
/// concrete kind intact through a serialization round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum ComputeError {
    /// The document data could not be validated.
    #[error("Invalid document data: {message}")]
    InvalidData {
        /// Description of the problem
        message: String,
    },

    /// An external validation service failed.
    #[error("{service} failed: {message}")]
    Backend {
        /// Name of the failing service
        service: String,
        /// Error reported by the service
        message: String,
    },

    /// The computation panicked.
    #[error("Status computation panicked: {message}")]
    Panicked {
        /// Panic payload, when it was a string
        message: String,
    },

    /// The computation observed a stop request and gave up.
    #[error("Status computation was cancelled")]
    Cancelled,
}

impl ComputeError {
    /// Create an invalid-data failure.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ComputeError::InvalidData {
            message: message.into(),
        }
    }

    /// Create a backend service failure.
    pub fn backend(service: impl Into<String>, message: impl Into<String>) -> Self {
        ComputeError::Backend {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Check if this failure is a cancellation rather than a real error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ComputeError::Cancelled)
    }
}
