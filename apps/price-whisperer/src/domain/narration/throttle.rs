//! Narration Throttle
//!
//! Keeps a noisy tick stream from producing rapid-fire narration. Only a
//! completed utterance opens a new window, so a run of failures neither
//! blocks narration forever nor lets two narrations overlap.

use std::time::{Duration, Instant};

/// Default minimum time between two completed narrations.
pub const MIN_SPEECH_INTERVAL: Duration = Duration::from_millis(2000);

/// Tracks when the last utterance completed.
#[derive(Debug, Clone)]
pub struct NarrationThrottle {
    min_interval: Duration,
    last_spoken_at: Option<Instant>,
}

impl Default for NarrationThrottle {
    fn default() -> Self {
        Self::new(MIN_SPEECH_INTERVAL)
    }
}

impl NarrationThrottle {
    /// Create an open throttle with the given window.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_spoken_at: None,
        }
    }

    /// Whether a narration may start at `now`. Does not mutate.
    #[must_use]
    pub fn try_acquire(&self, now: Instant) -> bool {
        self.last_spoken_at
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval)
    }

    /// Record a successfully completed utterance.
    pub const fn record_completion(&mut self, at: Instant) {
        self.last_spoken_at = Some(at);
    }

    /// When the last utterance completed.
    #[must_use]
    pub const fn last_spoken_at(&self) -> Option<Instant> {
        self.last_spoken_at
    }

    /// The configured window.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
