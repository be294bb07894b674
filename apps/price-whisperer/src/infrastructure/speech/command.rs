//! Command Speech Backend
//!
//! Speaks through an `espeak-ng` compatible executable. Each utterance runs
//! one child process; cancelling kills it.
//!
//! # Argument Mapping
//!
//! | Utterance | Flag | Scale            |
//! |-----------|------|------------------|
//! | voice     | `-v` | voice id         |
//! | volume    | `-a` | 0.0-1.0 → 0-200  |
//! | rate      | `-s` | 1.0 → 175 wpm    |
//! | pitch     | `-p` | 1.0 → 50 (0-99)  |

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SpeechBackend, SpeechError};
use crate::domain::narration::{Utterance, Voice};

const DEFAULT_WORDS_PER_MINUTE: f32 = 175.0;
const MAX_AMPLITUDE: f32 = 200.0;
const DEFAULT_PITCH: f32 = 50.0;

/// Speech backend that runs a synthesizer executable.
#[derive(Debug)]
pub struct CommandSpeech {
    program: String,
    voices: OnceCell<Vec<Voice>>,
    active: Mutex<Option<(u64, CancellationToken)>>,
    next_id: AtomicU64,
}

impl CommandSpeech {
    /// Create a backend for the given executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            voices: OnceCell::new(),
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// The executable.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn load_voices(&self) -> Vec<Voice> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let voices = parse_voice_listing(&String::from_utf8_lossy(&output.stdout));
                tracing::info!(program = %self.program, count = voices.len(), "Loaded voices");
                voices
            }
            Ok(output) => {
                tracing::warn!(
                    program = %self.program,
                    status = %output.status,
                    "Voice listing failed"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    program = %self.program,
                    error = %e,
                    "Speech synthesizer not available"
                );
                Vec::new()
            }
        }
    }

    fn release(&self, id: u64) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|(active_id, _)| *active_id == id) {
            *active = None;
        }
    }
}

#[async_trait]
impl SpeechBackend for CommandSpeech {
    async fn voices(&self) -> Vec<Voice> {
        self.voices.get_or_init(|| self.load_voices()).await.clone()
    }

    async fn voices_changed(&self) {
        // The listing is loaded once; it never changes afterwards.
        self.voices.get_or_init(|| self.load_voices()).await;
    }

    fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }

    fn cancel(&self) {
        if let Some((id, token)) = self.active.lock().take() {
            tracing::debug!(utterance = id, "Cancelling utterance");
            token.cancel();
        }
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(SpeechError::Busy);
            }
            *active = Some((id, token.clone()));
        }

        let spawned = Command::new(&self.program)
            .args(speech_args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let result = match spawned {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SpeechError::Unavailable(format!("{}: {e}", self.program)))
            }
            Err(e) => Err(SpeechError::Synthesis(e.to_string())),
            Ok(mut child) => tokio::select! {
                () = token.cancelled() => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "Failed to kill synthesizer");
                    }
                    Err(SpeechError::Interrupted)
                }
                status = child.wait() => match status {
                    Ok(status) if status.success() => Ok(()),
                    Ok(status) => Err(SpeechError::Synthesis(format!(
                        "{} exited with {status}",
                        self.program
                    ))),
                    Err(e) => Err(SpeechError::Synthesis(e.to_string())),
                },
            },
        };

        self.release(id);
        result
    }
}

/// Command-line arguments for one utterance.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn speech_args(utterance: &Utterance) -> Vec<String> {
    let amplitude = (utterance.volume.clamp(0.0, 1.0) * MAX_AMPLITUDE).round() as u32;
    let speed = (utterance.rate.max(0.1) * DEFAULT_WORDS_PER_MINUTE).round() as u32;
    let pitch = (utterance.pitch.max(0.0) * DEFAULT_PITCH).round().min(99.0) as u32;

    let mut args = Vec::with_capacity(9);
    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.id.clone());
    }
    args.extend([
        "-a".to_string(),
        amplitude.to_string(),
        "-s".to_string(),
        speed.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        utterance.text.clone(),
    ]);
    args
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  2  en-us           --/M      English_(America)  gmw/en-US            (en 2)
/// ```
fn parse_voice_listing(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [_, language, _, name, ..] => Some(Voice::new(*language, *name, *language)),
                _ => None,
            }
        })
        .collect()
}
