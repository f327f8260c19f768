//! Word schedule for backends without native word timing.
//!
//! The estimator spreads a paragraph's words evenly over its estimated
//! duration and is advanced once per frame. Time only accumulates while the
//! backend is not paused, so resuming continues exactly where it stopped.

use crate::defaults;
use std::time::{Duration, Instant};

/// Average time per word: `(chars / words) * (60 / speed)` milliseconds.
///
/// "Hello world" at speed 1.0 gives `(11 / 2) * 60 = 330ms`.
pub fn average_word_duration(char_count: usize, word_count: usize, speed: f32) -> Duration {
    if word_count == 0 {
        return Duration::ZERO;
    }
    let speed = f64::from(speed.max(defaults::MIN_SPEED));
    let millis = (char_count as f64 / word_count as f64) * (60.0 / speed);
    Duration::from_nanos((millis * 1_000_000.0).round() as u64)
}

/// Frame-driven schedule for one paragraph.
#[derive(Debug, Clone)]
pub struct TimingEstimator {
    word_count: usize,
    word_duration: Duration,
    elapsed: Duration,
    last_frame: Option<Instant>,
    next_word: usize,
}

impl TimingEstimator {
    pub fn new(word_count: usize, word_duration: Duration) -> Self {
        Self {
            word_count,
            word_duration,
            elapsed: Duration::ZERO,
            last_frame: None,
            next_word: 0,
        }
    }

    /// Schedule for a paragraph. A known clip length is split evenly across
    /// the words; otherwise the character-count estimate is used.
    pub fn for_paragraph(
        text: &str,
        word_count: usize,
        speed: f32,
        clip_duration: Option<Duration>,
    ) -> Self {
        let word_duration = match clip_duration {
            Some(clip) if word_count > 0 && !clip.is_zero() => {
                clip.div_f64(word_count as f64)
            }
            _ => average_word_duration(text.chars().count(), word_count, speed),
        };
        Self::new(word_count, word_duration)
    }

    pub fn word_duration(&self) -> Duration {
        self.word_duration
    }

    /// Time accumulated while not paused.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Advance to the frame at `now` and return the indices of words that
    /// became due, in order. Each index is returned exactly once.
    ///
    /// The first frame only anchors the clock and dispatches word 0.
    pub fn advance(&mut self, now: Instant, paused: bool) -> Vec<usize> {
        if let Some(last) = self.last_frame
            && !paused
        {
            self.elapsed += now.saturating_duration_since(last);
        }
        self.last_frame = Some(now);

        let mut due = Vec::new();
        if paused {
            return due;
        }
        while self.next_word < self.word_count && self.elapsed >= self.start_of(self.next_word) {
            due.push(self.next_word);
            self.next_word += 1;
        }
        due
    }

    fn start_of(&self, word: usize) -> Duration {
        self.word_duration.mul_f64(word as f64)
    }

    /// All words dispatched.
    pub fn is_finished(&self) -> bool {
        self.next_word >= self.word_count
    }
}
