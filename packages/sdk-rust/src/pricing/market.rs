//! Market order pricing.
//!
//! Two sets of figures come out of a quote. The `est_*` fields walk the
//! current book and are best-effort display values. The binding fields are
//! derived from `worst_price`, the slippage-adjusted limit that is actually
//! sent on chain.

use rust_decimal::Decimal;
use serde::Serialize;

use super::rounding::{parse_amount, round_ceil, round_down, round_floor, round_up};
use super::Scales;
use crate::models::{AmountSide, MarketConfig, Side};
use crate::orderbook::OrderbookLevel;

const SLIPPAGE_MARGIN: Decimal = Decimal::from_parts(11, 0, 0, false, 1);
const MIN_AUTO_SLIPPAGE: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const MAX_AUTO_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketOrderRequest<'a> {
    pub amount: &'a str,
    pub side: Side,
    pub amount_side: AmountSide,
    /// Slippage tolerance in percent; the auto value is used when absent
    pub slippage_percent: Option<Decimal>,
}

/// Result of greedily consuming book levels best price first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWalk {
    pub reference_price: Decimal,
    pub filled_base: Decimal,
    pub filled_quote: Decimal,
    /// Volume-weighted average over consumed levels, unrounded
    pub est_price: Decimal,
    pub est_worst_price: Decimal,
    pub est_slippage_percent: Decimal,
    /// The book ran out before the requested amount was filled
    pub exhausted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderQuote {
    pub side: Option<Side>,
    pub reference_price: Decimal,
    pub worst_price: Decimal,
    pub slippage_percent: Decimal,
    pub auto_slippage_percent: Decimal,
    pub est_price: Decimal,
    pub est_worst_price: Decimal,
    pub est_slippage_percent: Decimal,
    pub max_fee: Decimal,
    pub est_fee: Decimal,
    /// Buy: minimum base received. Sell: base paid.
    pub token_x: Decimal,
    pub est_token_x: Decimal,
    /// Buy: maximum quote paid including fee. Sell: minimum quote received after fee.
    pub token_y: Decimal,
    pub est_token_y: Decimal,
    pub insufficient_liquidity: bool,
}

impl MarketOrderQuote {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Walk `levels` (best price first) until `amount` of the given token is consumed
pub fn walk_book(levels: &[OrderbookLevel], amount: Decimal, amount_side: AmountSide) -> Option<BookWalk> {
    if amount <= Decimal::ZERO {
        return None;
    }

    let mut usable = levels
        .iter()
        .filter(|level| level.price > Decimal::ZERO && level.size > Decimal::ZERO)
        .peekable();
    let reference_price = usable.peek()?.price;

    let mut remaining = amount;
    let mut filled_base = Decimal::ZERO;
    let mut filled_quote = Decimal::ZERO;
    let mut est_worst_price = reference_price;

    for level in usable {
        if remaining <= Decimal::ZERO {
            break;
        }
        match amount_side {
            AmountSide::Base => {
                let take = remaining.min(level.size);
                filled_base = filled_base.checked_add(take)?;
                filled_quote = filled_quote.checked_add(take.checked_mul(level.price)?)?;
                remaining -= take;
            }
            AmountSide::Quote => {
                let level_value = level.price.checked_mul(level.size)?;
                if remaining >= level_value {
                    filled_base = filled_base.checked_add(level.size)?;
                    filled_quote = filled_quote.checked_add(level_value)?;
                    remaining -= level_value;
                } else {
                    filled_base = filled_base.checked_add(remaining.checked_div(level.price)?)?;
                    filled_quote = filled_quote.checked_add(remaining)?;
                    remaining = Decimal::ZERO;
                }
            }
        }
        est_worst_price = level.price;
    }

    if filled_base <= Decimal::ZERO {
        return None;
    }

    let est_price = filled_quote.checked_div(filled_base)?;
    let est_slippage_percent = (est_worst_price - reference_price)
        .abs()
        .checked_div(reference_price)?
        .checked_mul(HUNDRED)?;

    Some(BookWalk {
        reference_price,
        filled_base,
        filled_quote,
        est_price,
        est_worst_price,
        est_slippage_percent,
        exhausted: remaining > Decimal::ZERO,
    })
}

/// Slippage tolerance derived from the observed book slippage.
///
/// Adds a 10% margin, rounded up to one decimal, floored at 0.1% and capped at 5%.
pub fn auto_slippage(est_slippage_percent: Decimal) -> Decimal {
    let padded = round_up(est_slippage_percent * SLIPPAGE_MARGIN, 1);
    if padded.is_zero() {
        MIN_AUTO_SLIPPAGE
    } else {
        padded.min(MAX_AUTO_SLIPPAGE)
    }
}

/// Slippage-adjusted limit price sent on chain
pub fn worst_price(reference_price: Decimal, slippage_percent: Decimal, side: Side, price_scale: u32) -> Option<Decimal> {
    let tolerance = slippage_percent.checked_div(HUNDRED)?;
    let price = match side {
        Side::Buy => round_ceil(
            reference_price.checked_mul(Decimal::ONE.checked_add(tolerance)?)?,
            price_scale,
        ),
        Side::Sell => round_floor(
            reference_price.checked_mul(Decimal::ONE.checked_sub(tolerance)?)?,
            price_scale,
        ),
    };
    (price > Decimal::ZERO).then_some(price)
}

/// Price a market order against one side of the book, zero quote on unusable input.
///
/// `levels` is the side the order consumes (asks for a buy, bids for a sell),
/// best price first.
pub fn quote_market_order(
    request: &MarketOrderRequest<'_>,
    market: &MarketConfig,
    levels: &[OrderbookLevel],
) -> MarketOrderQuote {
    try_quote_market_order(request, market, levels).unwrap_or_default()
}

pub fn try_quote_market_order(
    request: &MarketOrderRequest<'_>,
    market: &MarketConfig,
    levels: &[OrderbookLevel],
) -> Option<MarketOrderQuote> {
    let amount = parse_amount(request.amount)?;
    if matches!(request.slippage_percent, Some(s) if s < Decimal::ZERO) {
        return None;
    }

    let scales = Scales::from(market);
    let fee_rate = market.market_fee_rate();
    let side = request.side;

    // Quantize the input first so the walk and the binding figures agree
    let (walk_amount, input) = match (side, request.amount_side) {
        (Side::Buy, AmountSide::Base) | (Side::Sell, AmountSide::Base) => {
            let x = round_down(amount, scales.token_x);
            (x, x)
        }
        (Side::Buy, AmountSide::Quote) => {
            let max_pay = round_floor(amount, scales.token_y);
            let gross = round_ceil(
                max_pay.checked_div(Decimal::ONE.checked_add(fee_rate)?)?,
                scales.token_y,
            );
            (gross, max_pay)
        }
        (Side::Sell, AmountSide::Quote) => {
            let keep = Decimal::ONE.checked_sub(fee_rate)?;
            if keep <= Decimal::ZERO {
                return None;
            }
            let min_receive = round_down(amount, scales.token_y);
            let gross = round_floor(min_receive.checked_div(keep)?, scales.token_y);
            (gross, min_receive)
        }
    };

    let walk = walk_book(levels, walk_amount, request.amount_side)?;
    let auto_slippage_percent = auto_slippage(walk.est_slippage_percent);
    let slippage_percent = request.slippage_percent.unwrap_or(auto_slippage_percent);
    let worst = worst_price(walk.reference_price, slippage_percent, side, scales.price)?;

    let est_price = match side {
        Side::Buy => round_ceil(walk.est_price, scales.price),
        Side::Sell => round_floor(walk.est_price, scales.price),
    };

    let mut quote = MarketOrderQuote {
        side: Some(side),
        reference_price: walk.reference_price,
        worst_price: worst,
        slippage_percent,
        auto_slippage_percent,
        est_price,
        est_worst_price: walk.est_worst_price,
        est_slippage_percent: walk.est_slippage_percent,
        insufficient_liquidity: walk.exhausted,
        ..MarketOrderQuote::default()
    };

    match (side, request.amount_side) {
        (Side::Buy, AmountSide::Base) => {
            let token_x = input;
            let gross = round_ceil(worst.checked_mul(token_x)?, scales.token_y);
            quote.max_fee = round_ceil(gross.checked_mul(fee_rate)?, scales.token_y);
            quote.token_x = token_x;
            quote.token_y = round_ceil(gross.checked_add(quote.max_fee)?, scales.token_y);

            let est_gross = round_ceil(walk.filled_quote, scales.token_y);
            quote.est_fee = round_ceil(est_gross.checked_mul(fee_rate)?, scales.token_y);
            quote.est_token_x = round_down(walk.filled_base, scales.token_x);
            quote.est_token_y = round_ceil(est_gross.checked_add(quote.est_fee)?, scales.token_y);
        }
        (Side::Buy, AmountSide::Quote) => {
            let gross = walk_amount;
            quote.max_fee = round_ceil(gross.checked_mul(fee_rate)?, scales.token_y);
            quote.token_x = round_down(gross.checked_div(worst)?, scales.token_x);
            quote.token_y = input;

            quote.est_fee = round_ceil(walk.filled_quote.checked_mul(fee_rate)?, scales.token_y);
            quote.est_token_x = round_down(walk.filled_base, scales.token_x);
            quote.est_token_y = round_ceil(walk.filled_quote.checked_add(quote.est_fee)?, scales.token_y);
        }
        (Side::Sell, AmountSide::Base) => {
            let token_x = input;
            let gross = round_floor(worst.checked_mul(token_x)?, scales.token_y);
            quote.max_fee = round_ceil(gross.checked_mul(fee_rate)?, scales.token_y);
            quote.token_x = token_x;
            quote.token_y = round_floor(gross.checked_sub(quote.max_fee)?, scales.token_y);

            let est_gross = round_floor(walk.filled_quote, scales.token_y);
            quote.est_fee = round_ceil(est_gross.checked_mul(fee_rate)?, scales.token_y);
            quote.est_token_x = round_down(walk.filled_base, scales.token_x);
            quote.est_token_y = round_floor(est_gross.checked_sub(quote.est_fee)?, scales.token_y);
        }
        (Side::Sell, AmountSide::Quote) => {
            let gross = walk_amount;
            quote.max_fee = round_ceil(gross.checked_mul(fee_rate)?, scales.token_y);
            quote.token_x = round_up(gross.checked_div(worst)?, scales.token_x);
            quote.token_y = input;

            quote.est_fee = round_ceil(walk.filled_quote.checked_mul(fee_rate)?, scales.token_y);
            quote.est_token_x = round_up(walk.filled_base, scales.token_x);
            quote.est_token_y = round_floor(walk.filled_quote.checked_sub(quote.est_fee)?, scales.token_y);
        }
    }

    Some(quote)
}
