//! Price Tracking Types
//!
//! Domain types for observed prices and the tracker that derives the
//! direction of change between consecutive ticks.
//!
//! # Design
//!
//! The tracker owns the last observed sample for one subscription. It is
//! only ever replaced, never cleared, and is dropped together with the
//! subscription that created it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Instrument
// =============================================================================

/// The single instrument a subscription follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Network the token lives on (e.g. `ethereum`).
    pub chain: String,
    /// Token contract address.
    pub token_address: String,
}

impl Instrument {
    /// Create a new instrument.
    #[must_use]
    pub fn new(chain: impl Into<String>, token_address: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            token_address: token_address.into(),
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chain, self.token_address)
    }
}

// =============================================================================
// Samples and Directions
// =============================================================================

/// One observed price. Immutable once observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceSample {
    /// Observed price.
    pub value: Decimal,
    /// When the price was observed.
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    /// Create a sample observed at the given instant.
    #[must_use]
    pub const fn new(value: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self { value, observed_at }
    }

    /// Create a sample observed now.
    #[must_use]
    pub fn now(value: Decimal) -> Self {
        Self::new(value, Utc::now())
    }
}

/// Direction reported to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Price rose.
    Up,
    /// Price fell.
    Down,
    /// First sample, or no change.
    #[default]
    Neutral,
}

impl Direction {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Neutral => "neutral",
        }
    }
}

/// Direction of an actual change. Never neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMove {
    /// Price rose.
    Up,
    /// Price fell.
    Down,
}

impl PriceMove {
    /// Compare two prices. Returns `None` when they are equal.
    #[must_use]
    pub fn between(previous: Decimal, current: Decimal) -> Option<Self> {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Some(Self::Up),
            std::cmp::Ordering::Less => Some(Self::Down),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl From<PriceMove> for Direction {
    fn from(movement: PriceMove) -> Self {
        match movement {
            PriceMove::Up => Self::Up,
            PriceMove::Down => Self::Down,
        }
    }
}

// =============================================================================
// Observation
// =============================================================================

/// Result of feeding one sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The very first sample of the subscription.
    First {
        /// The stored sample.
        current: PriceSample,
    },
    /// Same value as the stored sample. Nothing was mutated.
    Unchanged {
        /// The incoming sample.
        current: PriceSample,
    },
    /// The value differs from the stored sample, which was replaced.
    Changed {
        /// The sample that was replaced.
        previous: PriceSample,
        /// The new stored sample.
        current: PriceSample,
        /// Direction of the move.
        movement: PriceMove,
    },
}

impl Observation {
    /// Direction to report for this observation.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::First { .. } | Self::Unchanged { .. } => Direction::Neutral,
            Self::Changed { movement, .. } => (*movement).into(),
        }
    }

    /// Whether this was the first sample of the subscription.
    #[must_use]
    pub const fn is_first(&self) -> bool {
        matches!(self, Self::First { .. })
    }

    /// Whether the stored value changed.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// The incoming sample.
    #[must_use]
    pub const fn current(&self) -> &PriceSample {
        match self {
            Self::First { current }
            | Self::Unchanged { current }
            | Self::Changed { current, .. } => current,
        }
    }

    /// The incoming price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.current().value
    }

    /// The replaced sample, if the value changed.
    #[must_use]
    pub const fn previous(&self) -> Option<&PriceSample> {
        match self {
            Self::Changed { previous, .. } => Some(previous),
            _ => None,
        }
    }

    /// Whether this observation warrants a narration attempt.
    #[must_use]
    pub const fn is_announceable(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

// =============================================================================
// Price Tracker
// =============================================================================

/// Tracks the last observed price of one subscription.
///
/// # Example
///
/// ```rust
/// use price_whisperer::domain::pricing::{Direction, PriceSample, PriceTracker};
/// use rust_decimal::Decimal;
///
/// let mut tracker = PriceTracker::new();
///
/// let first = tracker.observe(PriceSample::now(Decimal::new(10000, 2)));
/// assert!(first.is_first());
/// assert_eq!(first.direction(), Direction::Neutral);
///
/// let next = tracker.observe(PriceSample::now(Decimal::new(10150, 2)));
/// assert_eq!(next.direction(), Direction::Up);
/// assert_eq!(next.previous().map(|p| p.value), Some(Decimal::new(10000, 2)));
/// ```
#[derive(Debug, Default)]
pub struct PriceTracker {
    last: Option<PriceSample>,
}

impl PriceTracker {
    /// Create a tracker with no stored price.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Feed a sample and report what changed.
    ///
    /// Mutates the stored sample exactly once when the value differs, or
    /// when nothing was stored yet. Equal values leave the state untouched.
    pub fn observe(&mut self, sample: PriceSample) -> Observation {
        let Some(previous) = self.last else {
            self.last = Some(sample);
            return Observation::First { current: sample };
        };

        match PriceMove::between(previous.value, sample.value) {
            Some(movement) => {
                self.last = Some(sample);
                Observation::Changed {
                    previous,
                    current: sample,
                    movement,
                }
            }
            None => Observation::Unchanged { current: sample },
        }
    }

    /// The stored sample, if any.
    #[must_use]
    pub const fn last(&self) -> Option<&PriceSample> {
        self.last.as_ref()
    }

    /// The stored price, if any.
    #[must_use]
    pub fn last_value(&self) -> Option<Decimal> {
        self.last.map(|sample| sample.value)
    }
}

// =============================================================================
// Tests
// =============================================================================
