//! Narration Engine
//!
//! Speaks price announcements through a [`SpeechBackend`] with a bounded,
//! fixed-delay retry loop.
//!
//! # Protocol
//!
//! 1. Build the sentence for the price and direction
//! 2. Drop the announcement if the throttle window is still closed
//! 3. Select a voice, waiting once for the backend's voice list if empty
//! 4. Cancel whatever the backend is saying
//! 5. Speak; on success record the completion time in the throttle
//! 6. On failure wait `retry_delay` and resubmit, up to `max_retries` times
//!
//! Failures never leave this module: exhausted retries are logged and the
//! rest of the pipeline carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SpeechBackend, SpeechError};
use crate::domain::narration::{
    NarrationConfig, NarrationOutcome, NarrationRequest, NarrationState, NarrationThrottle,
    Voice, narration_text,
};
use crate::domain::pricing::Direction;
use crate::infrastructure::metrics;

/// Drives narration against one speech backend.
///
/// The engine is exclusive: a newer announcement cancels the backend and
/// supersedes any older one that is still retrying.
pub struct NarrationEngine {
    backend: Arc<dyn SpeechBackend>,
    config: NarrationConfig,
    throttle: Mutex<NarrationThrottle>,
    state: Mutex<NarrationState>,
    generation: AtomicU64,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for NarrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationEngine")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl NarrationEngine {
    /// Create a new engine.
    #[must_use]
    pub fn new(backend: Arc<dyn SpeechBackend>, config: NarrationConfig) -> Self {
        let throttle = NarrationThrottle::new(config.min_interval);
        Self {
            backend,
            config,
            throttle: Mutex::new(throttle),
            state: Mutex::new(NarrationState::Idle),
            generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Current state of the most recent narration.
    #[must_use]
    pub fn state(&self) -> NarrationState {
        *self.state.lock()
    }

    /// Whether [`NarrationEngine::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Announce a price.
    ///
    /// Returns `None` when the announcement was suppressed by the throttle
    /// or the engine is shut down. Otherwise the speak-with-retry loop runs
    /// on its own task and the handle resolves to its outcome.
    pub fn announce(
        self: &Arc<Self>,
        price: Decimal,
        direction: Direction,
    ) -> Option<JoinHandle<NarrationOutcome>> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        let text = narration_text(price, direction);
        let now = Instant::now().into_std();

        if !self.throttle.lock().try_acquire(now) {
            tracing::debug!(text = %text, "Skipping narration, too soon since last announcement");
            metrics::record_narration_suppressed();
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(text = %text, generation, "Announcing price");

        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            let outcome = engine.speak_with_retry(text, generation).await;
            metrics::record_narration(outcome.as_str());
            outcome
        }))
    }

    /// Stop narrating: cancel the active utterance and turn pending retries
    /// into no-ops. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.backend.cancel();
        tracing::debug!("Narration engine shut down");
    }

    async fn speak_with_retry(&self, text: String, generation: u64) -> NarrationOutcome {
        let Some(voice) = self.select_voice().await else {
            return NarrationOutcome::Abandoned;
        };

        let mut request = NarrationRequest::new(text, voice);
        let utterance = request.utterance();

        loop {
            if let Some(outcome) = self.interrupted(generation) {
                return outcome;
            }

            self.set_state(
                generation,
                NarrationState::Speaking {
                    retry_count: request.retry_count,
                },
            );
            self.backend.cancel();

            let result = if self.backend.is_busy() {
                Err(SpeechError::Busy)
            } else {
                self.backend.speak(&utterance).await
            };

            let attempts = request.retry_count + 1;
            match result {
                Ok(()) => {
                    self.throttle
                        .lock()
                        .record_completion(Instant::now().into_std());
                    self.set_state(generation, NarrationState::Completed);
                    tracing::info!(text = %request.text, attempts, "Narration completed");
                    return NarrationOutcome::Completed { attempts };
                }
                Err(error) => {
                    log_speech_error(&error, &request);

                    if let Some(outcome) = self.interrupted(generation) {
                        return outcome;
                    }

                    self.set_state(
                        generation,
                        NarrationState::Failed {
                            retry_count: request.retry_count,
                        },
                    );

                    if request.retry_count >= self.config.max_retries {
                        tracing::error!(
                            text = %request.text,
                            attempts,
                            error = %error,
                            "Max retry attempts reached for narration"
                        );
                        return NarrationOutcome::Exhausted { attempts };
                    }

                    tracing::info!(
                        attempt = request.retry_count + 1,
                        max_retries = self.config.max_retries,
                        "Retrying narration"
                    );
                    metrics::record_narration_retry(error.kind());

                    tokio::select! {
                        () = self.shutdown.cancelled() => return NarrationOutcome::Abandoned,
                        () = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                    request.retry_count += 1;
                }
            }
        }
    }

    /// Pick the voice, waiting once for the backend's voice list.
    ///
    /// The outer `None` means the engine shut down while waiting.
    async fn select_voice(&self) -> Option<Option<Voice>> {
        let mut voices = self.backend.voices().await;

        if voices.is_empty() {
            tracing::debug!("Voice list not loaded yet, waiting for voices");
            tokio::select! {
                () = self.shutdown.cancelled() => return None,
                () = self.backend.voices_changed() => {}
            }
            voices = self.backend.voices().await;
        }

        let voice = self.config.voice_policy.select(&voices);
        tracing::debug!(
            voice = voice.as_ref().map_or("default", |v| v.name.as_str()),
            available = voices.len(),
            "Narration voice selected"
        );
        Some(voice)
    }

    fn interrupted(&self, generation: u64) -> Option<NarrationOutcome> {
        if self.shutdown.is_cancelled() {
            return Some(NarrationOutcome::Abandoned);
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Narration superseded by a newer announcement");
            return Some(NarrationOutcome::Superseded);
        }
        None
    }

    /// Only the most recent announcement writes the shared state.
    fn set_state(&self, generation: u64, state: NarrationState) {
        let mut current = self.state.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *current = state;
        }
    }
}

fn log_speech_error(error: &SpeechError, request: &NarrationRequest) {
    let voice = request.voice.as_ref().map_or("default", |v| v.name.as_str());
    match error {
        SpeechError::NotAllowed(_) => tracing::warn!(
            error = %error,
            voice,
            "Speech not allowed, the backend may need user interaction first"
        ),
        SpeechError::Interrupted | SpeechError::Canceled => {
            tracing::warn!(error = %error, voice, "Speech was interrupted");
        }
        SpeechError::Busy => tracing::warn!(voice, "Speech backend is busy, will retry"),
        _ => tracing::warn!(
            error = %error,
            kind = error.kind(),
            voice,
            text = %request.text,
            retry_count = request.retry_count,
            "Speech synthesis error"
        ),
    }
}
