//! Display State Adapter
//!
//! Headless implementation of [`DisplayPort`]. Keeps the latest frame for
//! the status endpoint, logs what a screen would show, and times the exit
//! transition of every departing price so the animation reaper can ask
//! whether it is still visible.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;

use crate::application::ports::{DisplayFrame, DisplayPort};
use crate::application::services::VisibilityPredicate;
use crate::domain::animation::{AnimationEntry, AnimationId, SharedAnimationQueue};

/// What the display currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    /// Waiting for the first price.
    Loading,
    /// Showing a price.
    Live,
    /// The feed failed; no price is shown.
    Unavailable,
}

impl DisplayStatus {
    fn of(frame: &DisplayFrame) -> Self {
        if frame.is_loading {
            Self::Loading
        } else if frame.price.is_some() {
            Self::Live
        } else {
            Self::Unavailable
        }
    }

    /// Label used in logs and the status endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Live => "live",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Point-in-time copy of the display.
#[derive(Debug, Clone, Serialize)]
pub struct DisplaySnapshot {
    /// Display status.
    pub status: DisplayStatus,
    /// Latest frame.
    pub frame: DisplayFrame,
    /// When the latest frame was rendered.
    pub updated_at: Option<DateTime<Utc>>,
    /// Frames rendered since start.
    pub frames_rendered: u64,
    /// Departing prices still on screen.
    pub departing: Vec<AnimationEntry>,
}

/// Headless display.
pub struct DisplayState {
    fade: Duration,
    animations: SharedAnimationQueue,
    frame: RwLock<(DisplayFrame, Option<DateTime<Utc>>)>,
    frames_rendered: AtomicU64,
    departures: Mutex<HashMap<AnimationId, Instant>>,
}

impl std::fmt::Debug for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayState")
            .field("fade", &self.fade)
            .field("frame", &self.frame.read().0)
            .field("frames_rendered", &self.frames_rendered.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl DisplayState {
    /// Create a display whose exit transitions last `fade`.
    #[must_use]
    pub fn new(animations: SharedAnimationQueue, fade: Duration) -> Self {
        Self {
            fade,
            animations,
            frame: RwLock::new((DisplayFrame::loading(), None)),
            frames_rendered: AtomicU64::new(0),
            departures: Mutex::new(HashMap::new()),
        }
    }

    /// Latest frame.
    #[must_use]
    pub fn frame(&self) -> DisplayFrame {
        self.frame.read().0
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> DisplayStatus {
        DisplayStatus::of(&self.frame.read().0)
    }

    /// Frames rendered since start.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Copy of the display, including departing prices.
    #[must_use]
    pub fn snapshot(&self) -> DisplaySnapshot {
        let (frame, updated_at) = *self.frame.read();
        DisplaySnapshot {
            status: DisplayStatus::of(&frame),
            frame,
            updated_at,
            frames_rendered: self.frames_rendered(),
            departing: self.animations.lock().snapshot(),
        }
    }

    /// Whether the exit transition of `id` is still running.
    ///
    /// Finished and unknown ids report `false`; finished ones are forgotten.
    pub fn is_still_visible(&self, id: AnimationId) -> bool {
        let mut departures = self.departures.lock();
        let Some(started) = departures.get(&id) else {
            return false;
        };
        if started.elapsed() < self.fade {
            return true;
        }
        departures.remove(&id);
        false
    }

    /// Visibility predicate for the animation reaper.
    #[must_use]
    pub fn visibility_predicate(self: &Arc<Self>) -> VisibilityPredicate {
        let display = Arc::clone(self);
        Arc::new(move |id| display.is_still_visible(id))
    }
}

impl DisplayPort for DisplayState {
    fn render(&self, frame: DisplayFrame) {
        *self.frame.write() = (frame, Some(Utc::now()));
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);

        match DisplayStatus::of(&frame) {
            DisplayStatus::Loading => tracing::info!("Loading price"),
            DisplayStatus::Unavailable => tracing::warn!("Price unavailable"),
            DisplayStatus::Live => tracing::info!(
                price = %frame.price.unwrap_or_default(),
                direction = frame.direction.as_str(),
                "Price"
            ),
        }
    }

    fn show_departure(&self, entry: &AnimationEntry) {
        self.departures.lock().insert(entry.id, Instant::now());
        tracing::debug!(
            animation_id = entry.id,
            price = %entry.price,
            direction = entry.direction.as_str(),
            "Price departing"
        );
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::animation::AnimationQueue;
    use crate::domain::pricing::{Direction, PriceMove};

    fn display() -> (DisplayState, SharedAnimationQueue) {
        let queue = AnimationQueue::shared();
        (
            DisplayState::new(Arc::clone(&queue), Duration::from_millis(1500)),
            queue,
        )
    }

    #[test]
    fn starts_loading() {
        let (display, _) = display();
        assert_eq!(display.status(), DisplayStatus::Loading);
        assert_eq!(display.frames_rendered(), 0);
        assert!(display.snapshot().updated_at.is_none());
    }

    #[test]
    fn tracks_latest_frame() {
        let (display, _) = display();
        display.render(DisplayFrame::price(Decimal::TEN, Direction::Up));
        assert_eq!(display.status(), DisplayStatus::Live);
        assert_eq!(display.frame().price, Some(Decimal::TEN));

        display.render(DisplayFrame::unavailable());
        assert_eq!(display.status(), DisplayStatus::Unavailable);
        assert_eq!(display.frames_rendered(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn departure_visible_until_fade_ends() {
        let (display, queue) = display();
        let id = queue.lock().enqueue(Decimal::ONE, PriceMove::Down);
        let entry = queue.lock().entries()[0];
        display.show_departure(&entry);

        tokio::time::advance(Duration::from_millis(1499)).await;
        assert!(display.is_still_visible(id));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!display.is_still_visible(id));
        assert!(display.departures.lock().is_empty());
    }

    #[test]
    fn unknown_departure_is_not_visible() {
        let (display, _) = display();
        assert!(!display.is_still_visible(42));
    }

    #[test]
    fn snapshot_includes_departing_prices() {
        let (display, queue) = display();
        queue.lock().enqueue(Decimal::ONE, PriceMove::Up);
        display.render(DisplayFrame::price(Decimal::TWO, Direction::Up));

        let snapshot = display.snapshot();
        assert_eq!(snapshot.departing.len(), 1);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "live");
        assert_eq!(json["frame"]["price"], "2");
        assert_eq!(json["departing"][0]["direction"], "up");
    }
}
