//! Error types for the recording engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad classification of a recording failure.
///
/// Error events carry this kind alongside the message so that callers can
/// react to the class of failure without parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A device, codec, or other resource is unavailable or exhausted.
    Resource,
    /// An invalid or unsupported format, or a codec/container setup failure.
    Format,
    /// A container write or file I/O failure.
    Io,
}

/// Errors produced by the recording engine and its collaborators.
#[derive(Debug, Clone, Error)]
pub enum RecordingError {
    #[error("resource error: {0}")]
    Resource(String),
    #[error("format error: {0}")]
    Format(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl RecordingError {
    /// The classification carried by error events for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordingError::Resource(_) => ErrorKind::Resource,
            RecordingError::Format(_) => ErrorKind::Format,
            RecordingError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn resource(msg: impl Into<String>) -> Self {
        RecordingError::Resource(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        RecordingError::Format(msg.into())
    }

    pub(crate) fn io(msg: impl Into<String>) -> Self {
        RecordingError::Io(msg.into())
    }
}
