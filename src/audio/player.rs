use crate::error::{ReadAloudError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Encoded audio returned by a remote speech service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// MIME type reported by the service, if any.
    pub content_type: Option<String>,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for audio output devices.
///
/// Plays one clip at a time; `play` replaces whatever was playing.
pub trait AudioPlayer: Send + Sync {
    /// Decode and start playing a clip.
    ///
    /// # Returns
    /// The clip duration when the decoder knows it, or an error if the clip
    /// cannot be decoded or the device is unavailable.
    fn play(&self, clip: AudioClip) -> Result<Option<Duration>>;

    fn pause(&self);

    fn resume(&self);

    /// Stop and drop the current clip.
    fn stop(&self);

    /// Volume multiplier, 1.0 is unchanged.
    fn set_volume(&self, volume: f32);

    fn is_paused(&self) -> bool;

    /// True when nothing is queued or the clip played to its end.
    fn is_finished(&self) -> bool;
}

#[derive(Debug, Default)]
struct MockPlayerState {
    played: Vec<AudioClip>,
    playing: bool,
    paused: bool,
    volume: f32,
    stop_calls: usize,
}

/// Mock audio player for testing.
///
/// Clones share state, so a test can keep one handle while the backend owns
/// another. A clip plays until [`MockPlayer::finish`] is called.
#[derive(Debug, Clone)]
pub struct MockPlayer {
    state: Arc<Mutex<MockPlayerState>>,
    duration: Option<Duration>,
    should_fail_play: bool,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockPlayerState {
                volume: 1.0,
                ..MockPlayerState::default()
            })),
            duration: None,
            should_fail_play: false,
        }
    }

    /// Configure the duration reported for every clip
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Configure the mock to reject every clip as undecodable
    pub fn with_play_failure(mut self) -> Self {
        self.should_fail_play = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockPlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate the current clip reaching its end.
    pub fn finish(&self) {
        let mut state = self.state();
        state.playing = false;
        state.paused = false;
    }

    pub fn played(&self) -> Vec<AudioClip> {
        self.state().played.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }

    pub fn stop_calls(&self) -> usize {
        self.state().stop_calls
    }
}

impl Default for MockPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlayer for MockPlayer {
    fn play(&self, clip: AudioClip) -> Result<Option<Duration>> {
        if self.should_fail_play {
            return Err(ReadAloudError::AudioDecode {
                message: "mock decode failure".to_string(),
            });
        }
        let mut state = self.state();
        state.played.push(clip);
        state.playing = true;
        state.paused = false;
        Ok(self.duration)
    }

    fn pause(&self) {
        let mut state = self.state();
        if state.playing {
            state.paused = true;
        }
    }

    fn resume(&self) {
        self.state().paused = false;
    }

    fn stop(&self) {
        let mut state = self.state();
        state.playing = false;
        state.paused = false;
        state.stop_calls += 1;
    }

    fn set_volume(&self, volume: f32) {
        self.state().volume = volume;
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn is_finished(&self) -> bool {
        !self.state().playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> AudioClip {
        AudioClip::new(vec![1, 2, 3], Some("audio/mpeg".to_string()))
    }

    #[test]
    fn test_mock_player_plays_until_finished() {
        let player = MockPlayer::new().with_duration(Duration::from_secs(2));
        assert!(player.is_finished());

        let duration = player.play(clip()).unwrap();
        assert_eq!(duration, Some(Duration::from_secs(2)));
        assert!(!player.is_finished());

        player.finish();
        assert!(player.is_finished());
        assert_eq!(player.played(), vec![clip()]);
    }

    #[test]
    fn test_mock_player_pause_only_while_playing() {
        let player = MockPlayer::new();
        player.pause();
        assert!(!player.is_paused());

        player.play(clip()).unwrap();
        player.pause();
        assert!(player.is_paused());
        player.resume();
        assert!(!player.is_paused());
    }

    #[test]
    fn test_mock_player_stop() {
        let player = MockPlayer::new();
        let handle = player.clone();
        player.play(clip()).unwrap();
        player.stop();
        assert!(handle.is_finished());
        assert_eq!(handle.stop_calls(), 1);
    }

    #[test]
    fn test_mock_player_failure() {
        let player = MockPlayer::new().with_play_failure();
        let result = player.play(clip());
        assert!(matches!(result, Err(ReadAloudError::AudioDecode { .. })));
        assert!(player.played().is_empty());
    }

    #[test]
    fn test_audio_clip_is_empty() {
        assert!(AudioClip::new(Vec::new(), None).is_empty());
        assert!(!clip().is_empty());
    }
}
