//! Voice Selection
//!
//! Picks the narration voice from whatever the speech backend reports.
//! Preference order:
//!
//! 1. A voice whose name or id matches the configured preference
//! 2. The first `en-US` voice
//! 3. The first English voice of any region
//! 4. The first voice in the list
//!
//! An empty list selects nothing, leaving the backend default in place.

use serde::Serialize;

/// Language every utterance is tagged with.
pub const NARRATION_LANGUAGE: &str = "en-US";

/// A voice offered by a speech backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Identifier passed back to the backend.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// BCP 47 style language tag, e.g. `en-us`.
    pub language: String,
}

impl Voice {
    /// Create a voice.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
        }
    }

    fn is_english(&self) -> bool {
        let lang = self.language.to_ascii_lowercase();
        lang == "en" || lang.starts_with("en-") || lang.starts_with("en_")
    }

    fn matches(&self, wanted: &str) -> bool {
        self.name.eq_ignore_ascii_case(wanted) || self.id.eq_ignore_ascii_case(wanted)
    }
}

/// Voice selection policy.
#[derive(Debug, Clone, Default)]
pub struct VoicePolicy {
    preferred: Option<String>,
}

impl VoicePolicy {
    /// Create a policy with an optional preferred voice name.
    #[must_use]
    pub fn new(preferred: Option<String>) -> Self {
        Self {
            preferred: preferred.filter(|name| !name.trim().is_empty()),
        }
    }

    /// The configured preference, if any.
    #[must_use]
    pub fn preferred(&self) -> Option<&str> {
        self.preferred.as_deref()
    }

    /// Pick a voice from the available list.
    #[must_use]
    pub fn select(&self, voices: &[Voice]) -> Option<Voice> {
        let preferred = self
            .preferred
            .as_deref()
            .and_then(|wanted| voices.iter().find(|v| v.matches(wanted)));

        preferred
            .or_else(|| {
                voices
                    .iter()
                    .find(|v| v.language.eq_ignore_ascii_case(NARRATION_LANGUAGE))
            })
            .or_else(|| voices.iter().find(|v| v.is_english()))
            .or_else(|| voices.first())
            .cloned()
    }
}
