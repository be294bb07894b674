//! Narration text.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::pricing::Direction;

/// Round a price to cents for speech, dropping trailing zeros.
///
/// Halves round away from zero, so `1.005` is spoken as `1.01`.
#[must_use]
pub fn spoken_price(price: Decimal) -> Decimal {
    price
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Build the sentence announced for a price.
///
/// Neutral prices are read as-is; moves are prefixed with their direction.
#[must_use]
pub fn narration_text(price: Decimal, direction: Direction) -> String {
    let price = spoken_price(price);
    match direction {
        Direction::Neutral => format!("{price} dollars"),
        Direction::Up => format!("going up. {price} dollars"),
        Direction::Down => format!("going down. {price} dollars"),
    }
}
