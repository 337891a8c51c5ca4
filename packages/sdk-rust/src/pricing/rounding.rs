//! Quantization helpers matching the contract's rounding modes.
//!
//! `down`/`up` round toward/away from zero, `floor`/`ceil` toward negative/positive
//! infinity. For the non-negative amounts handled here down == floor and
//! up == ceil, but the names are kept distinct so each call site reads like
//! the contract's own arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

pub fn round_down(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

pub fn round_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::AwayFromZero)
}

pub fn round_ceil(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToPositiveInfinity)
}

pub fn round_floor(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToNegativeInfinity)
}

/// Parse a user-entered amount.
///
/// Empty, non-numeric, negative and zero inputs all yield `None`; pricing
/// treats them alike as "nothing to compute".
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()?;
    (value > Decimal::ZERO).then_some(value)
}
