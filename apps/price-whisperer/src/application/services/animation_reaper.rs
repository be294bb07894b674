//! Animation Reaper
//!
//! Periodically drops departing prices whose exit transition has finished.
//! Visibility is answered by a predicate, usually backed by the display.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::animation::{AnimationId, SharedAnimationQueue};
use crate::infrastructure::metrics;

/// Default interval between two reaps.
pub const REAP_INTERVAL: Duration = Duration::from_millis(1000);

/// Answers whether a departing price is still on screen.
pub type VisibilityPredicate = Arc<dyn Fn(AnimationId) -> bool + Send + Sync>;

/// Timer that reaps finished departures.
pub struct AnimationReaper {
    queue: SharedAnimationQueue,
    interval: Duration,
    is_still_visible: VisibilityPredicate,
}

impl std::fmt::Debug for AnimationReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationReaper")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl AnimationReaper {
    /// Create a reaper.
    #[must_use]
    pub fn new(
        queue: SharedAnimationQueue,
        interval: Duration,
        is_still_visible: VisibilityPredicate,
    ) -> Self {
        Self {
            queue,
            interval,
            is_still_visible,
        }
    }

    /// Run one reap pass. Returns how many entries were dropped.
    pub fn reap_once(&self) -> usize {
        let mut queue = self.queue.lock();
        let reaped = queue.reap(|id| (self.is_still_visible)(id));
        if reaped > 0 {
            metrics::record_animations_reaped(reaped);
            metrics::set_animation_queue_depth(queue.len());
            tracing::trace!(reaped, remaining = queue.len(), "Reaped departing prices");
        }
        reaped
    }

    /// Reap on every tick of the interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Animation reaper cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.reap_once();
                }
            }
        }
    }

    /// Spawn [`AnimationReaper::run`] on the runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
