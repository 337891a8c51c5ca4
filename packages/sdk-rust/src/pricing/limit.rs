//! Limit order pricing.
//!
//! Every bound is rounded against the caller: fees and guaranteed payments
//! round up, guaranteed receipts round down. The result is therefore never
//! more favourable than what the matching contract will settle.

use rust_decimal::Decimal;
use serde::Serialize;

use super::rounding::{parse_amount, round_ceil, round_down, round_floor, round_up};
use super::Scales;
use crate::models::{AmountSide, MarketConfig, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitOrderRequest<'a> {
    pub price: &'a str,
    pub amount: &'a str,
    pub side: Side,
    pub amount_side: AmountSide,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyLimitQuote {
    pub price: Decimal,
    pub max_fee: Decimal,
    pub token_x_receive: Decimal,
    /// Quote spent before fees
    pub min_token_y_pay: Decimal,
    /// Quote spent including the maximum fee
    pub max_token_y_pay: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellLimitQuote {
    pub price: Decimal,
    pub max_fee: Decimal,
    pub token_x_pay: Decimal,
    /// Quote received after the maximum fee
    pub min_token_y_receive: Decimal,
    /// Quote received before fees
    pub max_token_y_receive: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "side", rename_all = "lowercase")]
pub enum LimitOrderQuote {
    Buy(BuyLimitQuote),
    Sell(SellLimitQuote),
}

impl LimitOrderQuote {
    /// All-zero quote returned when the inputs cannot be priced
    pub fn zero(side: Side) -> Self {
        match side {
            Side::Buy => LimitOrderQuote::Buy(BuyLimitQuote::default()),
            Side::Sell => LimitOrderQuote::Sell(SellLimitQuote::default()),
        }
    }

    pub fn side(&self) -> Side {
        match self {
            LimitOrderQuote::Buy(_) => Side::Buy,
            LimitOrderQuote::Sell(_) => Side::Sell,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero(self.side())
    }

    pub fn price(&self) -> Decimal {
        match self {
            LimitOrderQuote::Buy(q) => q.price,
            LimitOrderQuote::Sell(q) => q.price,
        }
    }

    pub fn max_fee(&self) -> Decimal {
        match self {
            LimitOrderQuote::Buy(q) => q.max_fee,
            LimitOrderQuote::Sell(q) => q.max_fee,
        }
    }

    /// Base token received (buy) or paid (sell)
    pub fn token_x(&self) -> Decimal {
        match self {
            LimitOrderQuote::Buy(q) => q.token_x_receive,
            LimitOrderQuote::Sell(q) => q.token_x_pay,
        }
    }

    /// Binding quote amount: maximum paid (buy) or minimum received (sell)
    pub fn token_y_bound(&self) -> Decimal {
        match self {
            LimitOrderQuote::Buy(q) => q.max_token_y_pay,
            LimitOrderQuote::Sell(q) => q.min_token_y_receive,
        }
    }
}

/// Price a limit order, falling back to the zero quote on unusable input
pub fn quote_limit_order(request: &LimitOrderRequest<'_>, market: &MarketConfig) -> LimitOrderQuote {
    try_quote_limit_order(request, market).unwrap_or_else(|| LimitOrderQuote::zero(request.side))
}

/// Price a limit order, returning `None` when nothing can be computed
pub fn try_quote_limit_order(
    request: &LimitOrderRequest<'_>,
    market: &MarketConfig,
) -> Option<LimitOrderQuote> {
    let price_input = parse_amount(request.price)?;
    let amount = parse_amount(request.amount)?;
    price_limit_order(
        price_input,
        amount,
        Scales::from(market),
        market.limit_fee_rate(),
        request.side,
        request.amount_side,
    )
}

/// Core limit pricing on already-parsed inputs.
///
/// Operation order within each branch is fixed; changing it changes the
/// last digit of the result.
pub fn price_limit_order(
    price_input: Decimal,
    amount: Decimal,
    scales: Scales,
    fee_rate: Decimal,
    side: Side,
    amount_side: AmountSide,
) -> Option<LimitOrderQuote> {
    let price = round_down(price_input, scales.price);
    if price <= Decimal::ZERO || amount <= Decimal::ZERO {
        return None;
    }

    let quote = match (side, amount_side) {
        (Side::Buy, AmountSide::Base) => {
            let token_x_receive = round_down(amount, scales.token_x);
            let min_token_y_pay = round_ceil(price.checked_mul(token_x_receive)?, scales.token_y);
            let max_fee = round_ceil(min_token_y_pay.checked_mul(fee_rate)?, scales.token_y);
            let max_token_y_pay = round_ceil(min_token_y_pay.checked_add(max_fee)?, scales.token_y);
            LimitOrderQuote::Buy(BuyLimitQuote {
                price,
                max_fee,
                token_x_receive,
                min_token_y_pay,
                max_token_y_pay,
            })
        }
        (Side::Buy, AmountSide::Quote) => {
            let max_token_y_pay = round_floor(amount, scales.token_y);
            let min_token_y_pay = round_ceil(
                max_token_y_pay.checked_div(Decimal::ONE.checked_add(fee_rate)?)?,
                scales.token_y,
            );
            let token_x_receive = round_down(min_token_y_pay.checked_div(price)?, scales.token_x);
            let max_fee = round_ceil(min_token_y_pay.checked_mul(fee_rate)?, scales.token_y);
            LimitOrderQuote::Buy(BuyLimitQuote {
                price,
                max_fee,
                token_x_receive,
                min_token_y_pay,
                max_token_y_pay,
            })
        }
        (Side::Sell, AmountSide::Base) => {
            let token_x_pay = round_down(amount, scales.token_x);
            let max_token_y_receive = round_floor(price.checked_mul(token_x_pay)?, scales.token_y);
            let max_fee = round_ceil(max_token_y_receive.checked_mul(fee_rate)?, scales.token_y);
            let min_token_y_receive =
                round_floor(max_token_y_receive.checked_sub(max_fee)?, scales.token_y);
            LimitOrderQuote::Sell(SellLimitQuote {
                price,
                max_fee,
                token_x_pay,
                min_token_y_receive,
                max_token_y_receive,
            })
        }
        (Side::Sell, AmountSide::Quote) => {
            let keep = Decimal::ONE.checked_sub(fee_rate)?;
            if keep <= Decimal::ZERO {
                return None;
            }
            let min_token_y_receive = round_down(amount, scales.token_y);
            let max_token_y_receive =
                round_floor(min_token_y_receive.checked_div(keep)?, scales.token_y);
            let token_x_pay = round_up(max_token_y_receive.checked_div(price)?, scales.token_x);
            let max_fee = round_ceil(max_token_y_receive.checked_mul(fee_rate)?, scales.token_y);
            LimitOrderQuote::Sell(SellLimitQuote {
                price,
                max_fee,
                token_x_pay,
                min_token_y_receive,
                max_token_y_receive,
            })
        }
    };

    Some(quote)
}
