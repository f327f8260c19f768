//! Logging of non-fatal failures and user-visible notices.
//!
//! Two channels with different audiences: [`ErrorReporter`] is the log for
//! failures that are resolved internally (highlighting, skipped paragraphs,
//! slow drains), [`Notifier`] carries the few messages a user must see.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Trait for reporting failures that do not stop playback.
pub trait ErrorReporter: Send + Sync {
    /// Reports a failure from a component.
    fn report(&self, component: &str, error: &dyn fmt::Display);
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, error: &dyn fmt::Display) {
        eprintln!("[{}] {}", component, error);
    }
}

/// Reporter that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    entries: Mutex<Vec<(String, String)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(component, message)` pairs in report order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, component: &str, error: &dyn fmt::Display) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((component.to_string(), error.to_string()));
    }
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A request arrived while a paragraph is still loading.
    PleaseWait,
    /// The document holds nothing to read after cleanup.
    NothingToRead,
    /// Playback could not start because of the configuration.
    Configuration(String),
    /// The session was halted by a terminal failure.
    Playback(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::PleaseWait => write!(f, "Please wait, the current paragraph is still loading"),
            Notice::NothingToRead => write!(f, "Nothing to read in this document"),
            Notice::Configuration(msg) => write!(f, "Text-to-speech is not configured: {}", msg),
            Notice::Playback(msg) => write!(f, "Text-to-speech failed: {}", msg),
        }
    }
}

/// Trait for surfacing notices to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that prints notices to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("readaloud: {}", notice);
    }
}

/// Notifier that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}
