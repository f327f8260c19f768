//! Runtime failures reported by speech backends.

use crate::error::ReadAloudError;
use std::fmt;

/// How the playback controller must react to a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected during stop and navigation; never shown to the user.
    Transient,
    /// Only the current paragraph is lost; playback continues with the next.
    Recoverable,
    /// The session is halted and the user is told once.
    Terminal,
}

/// Errors delivered through a backend's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Speech was interrupted or cancelled on purpose.
    Interrupted,
    /// The engine could not synthesize this paragraph.
    SynthesisFailed(String),
    /// The request never produced a response (network, timeout).
    Request(String),
    /// The service answered with a non-success status.
    Status { status: u16, message: String },
    /// The clip arrived but could not be played.
    Playback(String),
    /// Anything the engine could not classify.
    Unknown(String),
}

impl BackendError {
    pub fn severity(&self) -> Severity {
        match self {
            BackendError::Interrupted => Severity::Transient,
            BackendError::SynthesisFailed(_) => Severity::Recoverable,
            BackendError::Request(_)
            | BackendError::Status { .. }
            | BackendError::Playback(_)
            | BackendError::Unknown(_) => Severity::Terminal,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Interrupted => write!(f, "Speech interrupted"),
            BackendError::SynthesisFailed(msg) => write!(f, "Synthesis failed: {}", msg),
            BackendError::Request(msg) => write!(f, "Request failed: {}", msg),
            BackendError::Status { status, message } => {
                write!(f, "Service returned status {}: {}", status, message)
            }
            BackendError::Playback(msg) => write!(f, "Playback failed: {}", msg),
            BackendError::Unknown(msg) => write!(f, "Speech error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<ReadAloudError> for BackendError {
    fn from(error: ReadAloudError) -> Self {
        match error {
            ReadAloudError::Request { message } => BackendError::Request(message),
            ReadAloudError::ServiceStatus { status, message } => {
                BackendError::Status { status, message }
            }
            ReadAloudError::AudioOutput { message } | ReadAloudError::AudioDecode { message } => {
                BackendError::Playback(message)
            }
            other => BackendError::Unknown(other.to_string()),
        }
    }
}
