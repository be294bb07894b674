//! Logging Speech Backend
//!
//! Writes utterances to the log instead of speaking them. Used on hosts
//! without a synthesizer and in demos.

use async_trait::async_trait;

use crate::application::ports::{SpeechBackend, SpeechError};
use crate::domain::narration::{NARRATION_LANGUAGE, Utterance, Voice};

/// Speech backend that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeech;

impl LogSpeech {
    /// Create a new logging backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechBackend for LogSpeech {
    async fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("log", "Log", NARRATION_LANGUAGE)]
    }

    async fn voices_changed(&self) {}

    fn is_busy(&self) -> bool {
        false
    }

    fn cancel(&self) {}

    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        tracing::info!(
            text = %utterance.text,
            voice = utterance.voice.as_ref().map_or("default", |v| v.name.as_str()),
            "Narration"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        let speech = LogSpeech::new();
        let voices = speech.voices().await;
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].language, "en-US");
        assert!(!speech.is_busy());
        assert!(
            speech
                .speak(&Utterance::new("1 dollars".to_string(), None))
                .await
                .is_ok()
        );
    }
}
