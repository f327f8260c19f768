//! Playback states, commands and the events published to hosts.

use std::fmt;

/// Controller state. `Error` is only passed through on the way to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A paragraph request is in flight, or a cancelled one is draining.
    Loading,
    Speaking,
    Paused,
    Error,
}

impl PlaybackState {
    /// Whether a session exists in this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Loading | PlaybackState::Speaking | PlaybackState::Paused
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Speaking => "speaking",
            PlaybackState::Paused => "paused",
            PlaybackState::Error => "error",
        };
        f.write_str(name)
    }
}

/// User commands accepted by the driver loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Pause,
    Resume,
    TogglePause,
    Stop,
}

/// Progress published to an observer (status bar, CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    StateChanged(PlaybackState),
    ParagraphStarted(usize),
    ParagraphFinished(usize),
    /// The last paragraph finished.
    Finished,
    /// The session was stopped by the user.
    Stopped,
}
