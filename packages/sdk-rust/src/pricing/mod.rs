//! Client-side order pricing with rounding parity to the matching contract.
//!
//! All arithmetic is done on [`rust_decimal::Decimal`]; results are
//! quantized to the market's scaling factors. Unusable input never panics
//! or errors: it produces a zero quote.

pub mod limit;
pub mod market;
pub mod rounding;

pub use limit::{
    price_limit_order, quote_limit_order, try_quote_limit_order, BuyLimitQuote, LimitOrderQuote,
    LimitOrderRequest, SellLimitQuote,
};
pub use market::{
    auto_slippage, quote_market_order, try_quote_market_order, walk_book, worst_price, BookWalk,
    MarketOrderQuote, MarketOrderRequest,
};

use crate::models::MarketConfig;

/// Decimal places used to quantize prices and each token's amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scales {
    pub price: u32,
    pub token_x: u32,
    pub token_y: u32,
}

impl From<&MarketConfig> for Scales {
    fn from(market: &MarketConfig) -> Self {
        Self {
            price: market.price_scaling_factor,
            token_x: market.token_x_scaling_factor,
            token_y: market.token_y_scaling_factor,
        }
    }
}
