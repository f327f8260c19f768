//! Error types for readaloud.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadAloudError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("No API key configured for {service} (set {variable} or the config file)")]
    MissingCredential { service: String, variable: String },

    // Speech engine errors
    #[error("Speech engine not available: {engine}")]
    EngineNotFound { engine: String },

    #[error("Speech engine error: {message}")]
    Engine { message: String },

    // Remote service errors
    #[error("Speech service request failed: {message}")]
    Request { message: String },

    #[error("Speech service returned status {status}: {message}")]
    ServiceStatus { status: u16, message: String },

    // Audio output errors
    #[error("Audio output unavailable: {message}")]
    AudioOutput { message: String },

    #[error("Failed to decode audio clip: {message}")]
    AudioDecode { message: String },

    // Document / highlighting errors
    #[error("Offset {offset} is outside the document (length {length})")]
    OffsetOutOfRange { offset: usize, length: usize },

    #[error("Highlight failed: {message}")]
    Highlight { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ReadAloudError {
    /// True for errors detected before any session is started.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReadAloudError::ConfigFileNotFound { .. }
                | ReadAloudError::ConfigParse { .. }
                | ReadAloudError::ConfigInvalidValue { .. }
                | ReadAloudError::Config(_)
                | ReadAloudError::MissingCredential { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReadAloudError>;
