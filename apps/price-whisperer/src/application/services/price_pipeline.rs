//! Price Pipeline
//!
//! Fans each observation out to the display, the narration engine and the
//! departing-price queue, in that order.
//!
//! ```text
//! StreamSupervisor ──► Observation ──┬──► DisplayPort::render
//!                                    ├──► NarrationEngine::announce (if enabled)
//!                                    └──► AnimationQueue (on change)
//! ```

use std::sync::Arc;
use std::time::Instant;

use super::{NarrationEngine, StreamSupervisor, SubscriptionHandle};
use crate::application::ports::{DisplayFrame, DisplayPort, FeedError};
use crate::domain::animation::SharedAnimationQueue;
use crate::domain::narration::VoiceToggle;
use crate::domain::pricing::Observation;
use crate::infrastructure::metrics;

/// Wires one subscription to its consumers.
#[derive(Clone)]
pub struct PricePipeline {
    display: Arc<dyn DisplayPort>,
    animations: SharedAnimationQueue,
    narration: Option<Arc<NarrationEngine>>,
    voice: Arc<VoiceToggle>,
}

impl std::fmt::Debug for PricePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PricePipeline")
            .field("animations", &self.animations.lock().len())
            .field("narration", &self.narration.is_some())
            .field("voice_enabled", &self.voice.is_enabled())
            .finish_non_exhaustive()
    }
}

impl PricePipeline {
    /// Create a pipeline without narration.
    #[must_use]
    pub fn new(
        display: Arc<dyn DisplayPort>,
        animations: SharedAnimationQueue,
        voice: Arc<VoiceToggle>,
    ) -> Self {
        Self {
            display,
            animations,
            narration: None,
            voice,
        }
    }

    /// Announce announceable observations through this engine.
    #[must_use]
    pub fn with_narration(mut self, engine: Arc<NarrationEngine>) -> Self {
        self.narration = Some(engine);
        self
    }

    /// Show the loading frame and start the subscription.
    pub fn start(&self, supervisor: &StreamSupervisor) -> SubscriptionHandle {
        self.display.render(DisplayFrame::loading());

        let on_change = {
            let pipeline = self.clone();
            move |observation: &Observation| pipeline.handle_observation(observation)
        };
        let on_error = {
            let pipeline = self.clone();
            move |error: &FeedError| pipeline.handle_error(error)
        };

        supervisor.start(on_change, on_error)
    }

    /// Process one observation: display, then narration, then the
    /// departing-price queue.
    pub fn handle_observation(&self, observation: &Observation) {
        let started = Instant::now();

        let direction = observation.direction();
        self.display
            .render(DisplayFrame::price(observation.price(), direction));

        if observation.is_announceable()
            && self.voice.is_enabled()
            && let Some(engine) = &self.narration
        {
            // The handle is dropped; the retry loop runs to completion on its own.
            let _ = engine.announce(observation.price(), direction);
        }

        if let Observation::Changed {
            previous, movement, ..
        } = observation
        {
            let mut queue = self.animations.lock();
            let id = queue.enqueue(previous.value, *movement);
            if let Some(entry) = queue.entries().last() {
                self.display.show_departure(entry);
            }
            metrics::set_animation_queue_depth(queue.len());
            metrics::record_price_change(*movement);
            tracing::debug!(
                animation_id = id,
                departing = %previous.value,
                direction = movement.as_str(),
                "Price changed"
            );
        }

        metrics::record_processing_duration(started.elapsed());
    }

    /// Show the feed failure.
    pub fn handle_error(&self, error: &FeedError) {
        tracing::warn!(error = %error, "Price unavailable");
        self.display.render(DisplayFrame::unavailable());
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::animation::{AnimationEntry, AnimationQueue};
    use crate::domain::pricing::{Direction, PriceMove, PriceSample, PriceTracker};

    #[derive(Default)]
    struct RecordingDisplay {
        frames: Mutex<Vec<DisplayFrame>>,
        departures: Mutex<Vec<AnimationEntry>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl DisplayPort for RecordingDisplay {
        fn render(&self, frame: DisplayFrame) {
            self.frames.lock().push(frame);
            self.calls.lock().push("render");
        }

        fn show_departure(&self, entry: &AnimationEntry) {
            self.departures.lock().push(*entry);
            self.calls.lock().push("departure");
        }
    }

    fn pipeline(
        display: &Arc<RecordingDisplay>,
        enabled: bool,
    ) -> (PricePipeline, SharedAnimationQueue) {
        let queue = AnimationQueue::shared();
        let display: Arc<dyn DisplayPort> = display.clone();
        let pipeline = PricePipeline::new(
            display,
            Arc::clone(&queue),
            Arc::new(VoiceToggle::new(enabled)),
        );
        (pipeline, queue)
    }

    fn observe(tracker: &mut PriceTracker, cents: i64) -> Observation {
        tracker.observe(PriceSample::now(Decimal::new(cents, 2)))
    }

    #[test]
    fn change_enqueues_departing_price() {
        let display = Arc::new(RecordingDisplay::default());
        let (pipeline, queue) = pipeline(&display, false);
        let mut tracker = PriceTracker::new();

        for cents in [10000, 10000, 10150, 9925] {
            pipeline.handle_observation(&observe(&mut tracker, cents));
        }

        let entries = queue.lock().snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].price, Decimal::new(10000, 2));
        assert_eq!(entries[0].direction, PriceMove::Up);
        assert_eq!(entries[1].price, Decimal::new(10150, 2));
        assert_eq!(entries[1].direction, PriceMove::Down);
        assert_eq!(*display.departures.lock(), entries);
    }

    #[test]
    fn new_price_renders_before_old_one_departs() {
        let display = Arc::new(RecordingDisplay::default());
        let (pipeline, _) = pipeline(&display, false);
        let mut tracker = PriceTracker::new();

        pipeline.handle_observation(&observe(&mut tracker, 100));
        pipeline.handle_observation(&observe(&mut tracker, 150));

        assert_eq!(*display.calls.lock(), vec!["render", "render", "departure"]);
    }

    #[test]
    fn renders_every_tick() {
        let display = Arc::new(RecordingDisplay::default());
        let (pipeline, _) = pipeline(&display, false);
        let mut tracker = PriceTracker::new();

        pipeline.handle_observation(&observe(&mut tracker, 100));
        pipeline.handle_observation(&observe(&mut tracker, 100));
        pipeline.handle_observation(&observe(&mut tracker, 50));

        let frames = display.frames.lock();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| !f.is_loading && f.should_pulse == Some(true)));
        assert_eq!(frames[1].direction, Direction::Neutral);
        assert_eq!(frames[2].direction, Direction::Down);
        assert_eq!(frames[2].price, Some(Decimal::new(50, 2)));
    }

    #[test]
    fn error_renders_unavailable() {
        let display = Arc::new(RecordingDisplay::default());
        let (pipeline, _) = pipeline(&display, true);

        pipeline.handle_error(&FeedError::Transport("closed".into()));

        assert_eq!(*display.frames.lock(), vec![DisplayFrame::unavailable()]);
    }
}
