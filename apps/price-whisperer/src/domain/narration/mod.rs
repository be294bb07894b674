//! Narration Types
//!
//! Everything the narration engine decides without touching the speech
//! backend: the spoken sentence, the throttle window, voice selection, the
//! retry budget and the per-utterance state machine.
//!
//! # State Machine
//!
//! ```text
//!            announce
//!   Idle ─────────────► Speaking ──── ok ────► Completed
//!                          ▲   │
//!            retry_delay   │   │ error
//!                          │   ▼
//!                          Failed ── retries exhausted ──► (stays Failed)
//! ```

mod text;
mod throttle;
mod voice;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;

pub use text::{narration_text, spoken_price};
pub use throttle::{MIN_SPEECH_INTERVAL, NarrationThrottle};
pub use voice::{NARRATION_LANGUAGE, Voice, VoicePolicy};

/// Default number of retries after the first failed attempt.
pub const MAX_RETRIES: u32 = 3;

/// Default delay between two attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Utterance volume, 0.0 to 1.0.
pub const UTTERANCE_VOLUME: f32 = 0.5;

/// Utterance rate, 1.0 is normal speed.
pub const UTTERANCE_RATE: f32 = 1.0;

/// Utterance pitch, 1.0 is the voice's normal pitch.
pub const UTTERANCE_PITCH: f32 = 0.8;

// =============================================================================
// Configuration
// =============================================================================

/// Narration tuning.
#[derive(Debug, Clone)]
pub struct NarrationConfig {
    /// Minimum time between two completed utterances.
    pub min_interval: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay before each retry.
    pub retry_delay: Duration,
    /// Voice selection policy.
    pub voice_policy: VoicePolicy,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            min_interval: MIN_SPEECH_INTERVAL,
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            voice_policy: VoicePolicy::default(),
        }
    }
}

// =============================================================================
// Requests and Utterances
// =============================================================================

/// One narration, alive for a single speak attempt and its retries.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationRequest {
    /// Sentence to speak.
    pub text: String,
    /// Selected voice, `None` for the backend default.
    pub voice: Option<Voice>,
    /// Retries performed so far.
    pub retry_count: u32,
}

impl NarrationRequest {
    /// Create a request that has not been retried yet.
    #[must_use]
    pub const fn new(text: String, voice: Option<Voice>) -> Self {
        Self {
            text,
            voice,
            retry_count: 0,
        }
    }

    /// Build the utterance submitted to the backend.
    #[must_use]
    pub fn utterance(&self) -> Utterance {
        Utterance::new(self.text.clone(), self.voice.clone())
    }
}

/// What the speech backend is asked to say.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Sentence to speak.
    pub text: String,
    /// Voice, `None` for the backend default.
    pub voice: Option<Voice>,
    /// Volume, 0.0 to 1.0.
    pub volume: f32,
    /// Speaking rate, 1.0 is normal.
    pub rate: f32,
    /// Pitch, 1.0 is normal.
    pub pitch: f32,
    /// Language tag.
    pub language: &'static str,
}

impl Utterance {
    /// Create an utterance with the narration defaults.
    #[must_use]
    pub const fn new(text: String, voice: Option<Voice>) -> Self {
        Self {
            text,
            voice,
            volume: UTTERANCE_VOLUME,
            rate: UTTERANCE_RATE,
            pitch: UTTERANCE_PITCH,
            language: NARRATION_LANGUAGE,
        }
    }
}

// =============================================================================
// State and Outcome
// =============================================================================

/// Narration engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum NarrationState {
    /// Nothing spoken yet.
    #[default]
    Idle,
    /// An utterance was submitted.
    Speaking {
        /// Retries performed before this attempt.
        retry_count: u32,
    },
    /// The last utterance finished.
    Completed,
    /// The last attempt failed.
    Failed {
        /// Retries performed before the failed attempt.
        retry_count: u32,
    },
}

/// How one `announce` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// The utterance was spoken to the end.
    Completed {
        /// Attempts used, including the first.
        attempts: u32,
    },
    /// Every attempt failed.
    Exhausted {
        /// Attempts used, including the first.
        attempts: u32,
    },
    /// A newer announcement took over the backend.
    Superseded,
    /// The engine was shut down.
    Abandoned,
}

impl NarrationOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Exhausted { .. } => "exhausted",
            Self::Superseded => "superseded",
            Self::Abandoned => "abandoned",
        }
    }
}

// =============================================================================
// Voice Toggle
// =============================================================================

/// Whether ticks should be narrated at all.
#[derive(Debug)]
pub struct VoiceToggle {
    enabled: AtomicBool,
}

impl VoiceToggle {
    /// Create a toggle in the given position.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Whether narration is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn narration on or off.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the toggle and return the new position.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }
}
