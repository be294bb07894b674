//! Speech Backend Adapters
//!
//! Implementations of the [`SpeechBackend`] port.
//!
//! - `CommandSpeech`: Runs an `espeak-ng` compatible executable
//! - `LogSpeech`: Logs utterances (`NARRATION_COMMAND=log`)

mod command;
mod log;

use std::sync::Arc;

pub use command::CommandSpeech;
pub use log::LogSpeech;

use crate::application::ports::SpeechBackend;

/// Executable name that selects [`LogSpeech`].
pub const LOG_BACKEND: &str = "log";

/// Build the speech backend for a configured command.
#[must_use]
pub fn speech_backend(command: &str) -> Arc<dyn SpeechBackend> {
    if command.eq_ignore_ascii_case(LOG_BACKEND) {
        Arc::new(LogSpeech::new())
    } else {
        Arc::new(CommandSpeech::new(command))
    }
}
