//! Conversion between contract integer units (atoms) and decimal amounts
//!
//! A scaling factor is a number of decimal places: an amount of `1.5` with
//! scaling factor 6 is `1_500_000` atoms on chain.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Convert a decimal amount to atoms, truncating digits beyond `scale`
///
/// Returns `None` for negative amounts or values that do not fit.
///
/// # Example
/// ```
/// use dex_sdk::to_atoms;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
/// assert_eq!(to_atoms(Decimal::from_str("1.5").unwrap(), 6), Some(1_500_000));
/// assert_eq!(to_atoms(Decimal::from_str("0.0000019").unwrap(), 6), Some(1));
/// ```
pub fn to_atoms(amount: Decimal, scale: u32) -> Option<u128> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return None;
    }
    let truncated = amount.round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    let multiplier = Decimal::try_from_i128_with_scale(10i128.checked_pow(scale)?, 0).ok()?;
    truncated.checked_mul(multiplier)?.to_u128()
}

/// Convert atoms to a decimal amount
///
/// # Example
/// ```
/// use dex_sdk::from_atoms;
/// assert_eq!(from_atoms(123_456_789, 6).to_string(), "123.456789");
/// ```
pub fn from_atoms(atoms: u128, scale: u32) -> Decimal {
    let atoms = i128::try_from(atoms).unwrap_or(i128::MAX);
    Decimal::try_from_i128_with_scale(atoms, scale).unwrap_or(Decimal::MAX)
}

/// Format a decimal with thousands separators, truncated to `max_decimals`
///
/// # Example
/// ```
/// use dex_sdk::format_decimal;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
/// assert_eq!(format_decimal(Decimal::from_str("1234.5678").unwrap(), 2), "1,234.56");
/// assert_eq!(format_decimal(Decimal::from_str("1000000").unwrap(), 2), "1,000,000");
/// ```
pub fn format_decimal(value: Decimal, max_decimals: u32) -> String {
    let rounded = value
        .round_dp_with_strategy(max_decimals, RoundingStrategy::ToZero)
        .normalize();
    let formatted = rounded.abs().to_string();

    let (integer, decimal) = match formatted.split_once('.') {
        Some((integer, decimal)) => (integer, Some(decimal)),
        None => (formatted.as_str(), None),
    };

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let with_commas = add_commas(integer);

    match decimal {
        Some(dec) => format!("{}{}.{}", sign, with_commas, dec),
        None => format!("{}{}", sign, with_commas),
    }
}

/// Add commas to an integer string
fn add_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::new();
    let len = chars.len();

    for (i, c) in chars.iter().enumerate() {
        result.push(*c);
        let pos = len - i - 1;
        if pos > 0 && pos % 3 == 0 {
            result.push(',');
        }
    }

    result
}
