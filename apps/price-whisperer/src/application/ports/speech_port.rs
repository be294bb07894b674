//! Speech Backend Port (Driven Port)
//!
//! Interface for the speech synthesizer that narrates prices. The backend
//! may be busy, may refuse to speak, or may fail in transit; every one of
//! those failures is reported through [`SpeechError`] and treated as
//! retryable by the narration engine.

use async_trait::async_trait;

use crate::domain::narration::{Utterance, Voice};

/// Speech backend error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// Another utterance is already active.
    #[error("speech backend is busy")]
    Busy,

    /// The backend refused to speak.
    #[error("speech not allowed: {0}")]
    NotAllowed(String),

    /// The utterance was canceled before it started.
    #[error("utterance canceled")]
    Canceled,

    /// The utterance was cut off while speaking.
    #[error("utterance interrupted")]
    Interrupted,

    /// A network-backed voice failed.
    #[error("speech network error: {0}")]
    Network(String),

    /// No synthesizer is available.
    #[error("speech backend unavailable: {0}")]
    Unavailable(String),

    /// Anything else.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

impl SpeechError {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::NotAllowed(_) => "not_allowed",
            Self::Canceled => "canceled",
            Self::Interrupted => "interrupted",
            Self::Network(_) => "network",
            Self::Unavailable(_) => "unavailable",
            Self::Synthesis(_) => "synthesis",
        }
    }
}

/// Port for speaking utterances.
///
/// At most one utterance is active at a time; the narration engine calls
/// [`SpeechBackend::cancel`] before every submission.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Voices currently known to the backend. May be empty while loading.
    async fn voices(&self) -> Vec<Voice>;

    /// Resolves once the voice list has (possibly) changed.
    async fn voices_changed(&self);

    /// Whether an utterance is speaking or pending.
    fn is_busy(&self) -> bool;

    /// Stop the active utterance, if any.
    fn cancel(&self);

    /// Speak an utterance to completion.
    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(SpeechError::Busy.kind(), "busy");
        assert_eq!(SpeechError::NotAllowed("x".into()).kind(), "not_allowed");
        assert_eq!(SpeechError::Canceled.kind(), "canceled");
        assert_eq!(SpeechError::Interrupted.kind(), "interrupted");
        assert_eq!(SpeechError::Network("x".into()).kind(), "network");
        assert_eq!(SpeechError::Unavailable("x".into()).kind(), "unavailable");
        assert_eq!(SpeechError::Synthesis("x".into()).kind(), "synthesis");
    }

    #[test]
    fn error_display() {
        assert_eq!(SpeechError::Busy.to_string(), "speech backend is busy");
        assert_eq!(
            SpeechError::Network("timeout".into()).to_string(),
            "speech network error: timeout"
        );
    }
}
