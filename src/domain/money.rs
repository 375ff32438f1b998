//! Currency conversion between exact decimals and stored integer cents.
//!
//! All arithmetic happens on `Decimal` without intermediate rounding; values
//! are rounded half-up to cents only when crossing the persistence boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round half-up to whole cents. Saturates on overflow, which cannot be hit
/// by amounts that passed validation.
pub fn to_cents(value: Decimal) -> i64 {
    (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
