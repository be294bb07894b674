//! Departing Price Animations
//!
//! When the price changes, the old value leaves the display with a short
//! transition. The queue records those departing values so the display can
//! render them, and drops each entry once the display reports that its
//! transition has finished.
//!
//! The queue never looks at the display itself: visibility is answered by a
//! predicate supplied to [`AnimationQueue::reap`].

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;

use super::pricing::PriceMove;

/// Identifier of a departing price. Strictly increasing, never reused.
pub type AnimationId = u64;

/// Queue shared between the tick loop, the reaper and the status endpoint.
pub type SharedAnimationQueue = Arc<Mutex<AnimationQueue>>;

/// A price that has just been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnimationEntry {
    /// Lookup key for the display element.
    pub id: AnimationId,
    /// The departing price.
    pub price: Decimal,
    /// Direction of the move that displaced it.
    pub direction: PriceMove,
}

/// Insertion-ordered list of departing prices.
///
/// # Example
///
/// ```rust
/// use price_whisperer::domain::animation::AnimationQueue;
/// use price_whisperer::domain::pricing::PriceMove;
/// use rust_decimal::Decimal;
///
/// let mut queue = AnimationQueue::new();
/// let a = queue.enqueue(Decimal::new(100, 0), PriceMove::Up);
/// let b = queue.enqueue(Decimal::new(101, 0), PriceMove::Down);
/// assert!(b > a);
///
/// // The display says `a` has faded out.
/// queue.reap(|id| id != a);
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AnimationQueue {
    entries: Vec<AnimationEntry>,
    next_id: AnimationId,
}

impl AnimationQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Create an empty queue wrapped for sharing.
    #[must_use]
    pub fn shared() -> SharedAnimationQueue {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Record a departing price and return its id.
    pub fn enqueue(&mut self, price: Decimal, direction: PriceMove) -> AnimationId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(AnimationEntry {
            id,
            price,
            direction,
        });
        id
    }

    /// Remove every entry the predicate reports as no longer visible.
    ///
    /// Returns the number of removed entries.
    pub fn reap<F>(&mut self, mut is_still_visible: F) -> usize
    where
        F: FnMut(AnimationId) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| is_still_visible(entry.id));
        before - self.entries.len()
    }

    /// Live entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[AnimationEntry] {
        &self.entries
    }

    /// Copy of the live entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AnimationEntry> {
        self.entries.clone()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn enqueue_assigns_sequential_ids() {
        let mut queue = AnimationQueue::new();
        assert_eq!(queue.enqueue(Decimal::ONE, PriceMove::Up), 0);
        assert_eq!(queue.enqueue(Decimal::TWO, PriceMove::Down), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn reap_removes_invisible_entries_and_keeps_order() {
        let mut queue = AnimationQueue::new();
        let a = queue.enqueue(Decimal::new(1, 0), PriceMove::Up);
        let b = queue.enqueue(Decimal::new(2, 0), PriceMove::Up);
        let c = queue.enqueue(Decimal::new(3, 0), PriceMove::Down);

        let removed = queue.reap(|id| id != b);

        assert_eq!(removed, 1);
        let ids: Vec<_> = queue.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn reap_everything() {
        let mut queue = AnimationQueue::new();
        queue.enqueue(Decimal::ONE, PriceMove::Up);
        queue.enqueue(Decimal::ONE, PriceMove::Down);

        assert_eq!(queue.reap(|_| false), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_reap() {
        let mut queue = AnimationQueue::new();
        let a = queue.enqueue(Decimal::ONE, PriceMove::Up);
        queue.reap(|_| false);
        let b = queue.enqueue(Decimal::ONE, PriceMove::Up);
        assert!(b > a);
    }

    #[test]
    fn entry_serialization() {
        let entry = AnimationEntry {
            id: 7,
            price: Decimal::new(10150, 2),
            direction: PriceMove::Down,
        };
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["price"], "101.50");
        assert_eq!(json["direction"], "down");
    }

    proptest! {
        #[test]
        fn ids_strictly_increase_across_reaps(ops in prop::collection::vec(any::<bool>(), 1..128)) {
            let mut queue = AnimationQueue::new();
            let mut last: Option<AnimationId> = None;

            for reap in ops {
                if reap {
                    queue.reap(|id| id % 2 == 0);
                } else {
                    let id = queue.enqueue(Decimal::ONE, PriceMove::Up);
                    if let Some(prev) = last {
                        prop_assert!(id > prev);
                    }
                    last = Some(id);
                }
            }
        }
    }
}
