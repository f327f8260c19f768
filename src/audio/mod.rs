//! Audio output for clips fetched from remote speech services.

pub mod player;
#[cfg(feature = "playback")]
pub mod rodio_player;

pub use player::{AudioClip, AudioPlayer, MockPlayer};

use crate::error::Result;
use std::sync::Arc;

/// Open the default output device.
#[cfg(feature = "playback")]
pub fn default_player() -> Result<Arc<dyn AudioPlayer>> {
    Ok(Arc::new(rodio_player::RodioPlayer::open()?))
}

/// Without the `playback` feature there is no output device to open.
#[cfg(not(feature = "playback"))]
pub fn default_player() -> Result<Arc<dyn AudioPlayer>> {
    Err(crate::error::ReadAloudError::AudioOutput {
        message: "built without the `playback` feature".to_string(),
    })
}
