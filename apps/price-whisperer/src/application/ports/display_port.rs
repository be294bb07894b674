//! Display Port (Driven Port)
//!
//! The presentation boundary. Rendering, styling and number animation all
//! live behind this trait; the pipeline only reports what should be shown.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::animation::AnimationEntry;
use crate::domain::pricing::Direction;

/// What the display should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DisplayFrame {
    /// Price to show, `None` while loading or after a feed failure.
    pub price: Option<Decimal>,
    /// Direction of the last move.
    pub direction: Direction,
    /// Whether the feed has not delivered a price yet.
    pub is_loading: bool,
    /// Whether the display should pulse on this frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_pulse: Option<bool>,
}

impl DisplayFrame {
    /// Frame shown while the subscription is opening.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            price: None,
            direction: Direction::Neutral,
            is_loading: true,
            should_pulse: None,
        }
    }

    /// Frame shown after the feed failed.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            price: None,
            direction: Direction::Neutral,
            is_loading: false,
            should_pulse: None,
        }
    }

    /// Frame for a processed tick.
    #[must_use]
    pub const fn price(price: Decimal, direction: Direction) -> Self {
        Self {
            price: Some(price),
            direction,
            is_loading: false,
            should_pulse: Some(true),
        }
    }
}

/// Port for the presentation layer.
pub trait DisplayPort: Send + Sync {
    /// Show a frame. Called on every processed tick and on start/error.
    fn render(&self, frame: DisplayFrame);

    /// A superseded price starts leaving the display.
    fn show_departure(&self, entry: &AnimationEntry) {
        let _ = entry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_frame() {
        let frame = DisplayFrame::loading();
        assert!(frame.is_loading);
        assert!(frame.price.is_none());
        assert!(frame.should_pulse.is_none());
    }

    #[test]
    fn unavailable_frame() {
        let frame = DisplayFrame::unavailable();
        assert!(!frame.is_loading);
        assert!(frame.price.is_none());
        assert_eq!(frame.direction, Direction::Neutral);
    }

    #[test]
    fn price_frame_serialization() {
        let frame = DisplayFrame::price(Decimal::new(10150, 2), Direction::Up);
        let json = serde_json::to_value(frame).unwrap();
        assert_eq!(json["price"], "101.50");
        assert_eq!(json["direction"], "up");
        assert_eq!(json["is_loading"], false);
        assert_eq!(json["should_pulse"], true);
    }
}
