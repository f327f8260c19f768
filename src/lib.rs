//! readaloud - Read documents aloud with a synchronized highlight
//!
//! Paragraph-by-paragraph text-to-speech across local and remote speech
//! services, keeping a reading-position highlight in step with the audio.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod playback;
pub mod report;
#[cfg(feature = "cli")]
pub mod terminal;
pub mod text;

// Composition root - needs the terminal surface
#[cfg(feature = "cli")]
pub mod app;

// Core traits (backend → controller → host)
pub use backend::{BackendProvider, SpeechBackend};
pub use playback::{DocumentHost, PlaybackController};

// Error handling
pub use error::{ReadAloudError, Result};

// Config
pub use config::{Config, SpeechService};

// Reporting
pub use report::{ErrorReporter, Notifier};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
