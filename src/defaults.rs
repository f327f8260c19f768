//! Default configuration constants for readaloud.
//!
//! Shared by the config layer, the backends and the playback controller so
//! the same numbers are used everywhere.

/// Interval between frame-clock ticks in milliseconds.
///
/// Roughly one display refresh at 60Hz. The timing estimator and the
/// navigation drain poll both advance on this clock.
pub const FRAME_INTERVAL_MS: u64 = 16;

/// Interval between "is anything still speaking" checks while draining
/// a cancelled utterance before navigation.
pub const DRAIN_POLL_MS: u64 = 20;

/// Upper bound on the navigation drain wait.
///
/// If the backend still reports speech after this long the controller logs
/// and starts the target paragraph anyway.
pub const DRAIN_TIMEOUT_MS: u64 = 2000;

/// Default playback speed multiplier.
pub const SPEED: f32 = 1.0;

/// Accepted playback speed range.
pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

/// Default pitch multiplier (1.0 = engine default).
pub const PITCH: f32 = 1.0;

/// Default volume (0.0 to 1.0).
pub const VOLUME: f32 = 1.0;

/// Default on-device synthesizer command.
pub const LOCAL_COMMAND: &str = "espeak-ng";

/// Default on-device voice.
pub const LOCAL_VOICE: &str = "en";

/// Speaking rate of the on-device engine at speed 1.0.
pub const LOCAL_WORDS_PER_MINUTE: u32 = 175;

/// Default voice for remote service A.
pub const CLOUD_VOICE: &str = "default";

/// OpenAI-compatible speech endpoint used by remote service B.
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";

/// Default voice for remote service B.
pub const OPENAI_VOICE: &str = "alloy";

/// Default model for remote service B.
pub const OPENAI_MODEL: &str = "tts-1";

/// Environment variable holding the API key for remote service A.
pub const CLOUD_API_KEY_ENV: &str = "READALOUD_CLOUD_API_KEY";

/// Environment variable holding the API key for remote service B.
pub const OPENAI_API_KEY_ENV: &str = "READALOUD_OPENAI_API_KEY";

/// Highlight style names passed to the document host.
pub const PARAGRAPH_STYLE: &str = "paragraph";
pub const WORD_STYLE: &str = "word";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_poll_is_shorter_than_timeout() {
        const { assert!(DRAIN_POLL_MS < DRAIN_TIMEOUT_MS) };
    }

    #[test]
    fn default_speed_is_in_range() {
        assert!((MIN_SPEED..=MAX_SPEED).contains(&SPEED));
    }
}
