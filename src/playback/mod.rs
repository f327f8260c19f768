//! Playback orchestration and highlight synchronization.
//!
//! The [`PlaybackController`] reads a document paragraph by paragraph through
//! a speech backend and keeps the host's highlight in step, using native word
//! boundaries when the backend has them and a frame-driven
//! [`TimingEstimator`] otherwise.

pub mod clock;
pub mod controller;
pub mod highlight;
pub mod state;
pub mod timing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::PlaybackController;
pub use highlight::{
    DisplayPosition, DocumentHost, HighlightHandle, HighlightKind, HighlightSpan, Highlighter,
    MemoryHost,
};
pub use state::{Command, PlaybackState, PlayerEvent};
pub use timing::{TimingEstimator, average_word_duration};
