use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Which token an order amount is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSide {
    /// Token X
    Base,
    /// Token Y
    Quote,
}

/// Fee and scaling parameters of a market, as published by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConfig {
    pub id: String,
    pub token_x_scaling_factor: u32,
    pub token_y_scaling_factor: u32,
    pub price_scaling_factor: u32,
    pub aggressive_fee: Decimal,
    pub passive_fee: Decimal,
    pub passive_order_payout: Decimal,
}

impl MarketConfig {
    /// Fee rate used to bound a limit order.
    ///
    /// A resting order may end up filled on either the aggressive or the
    /// passive path, so the larger of the two envelopes is taken.
    pub fn limit_fee_rate(&self) -> Decimal {
        let aggressive = self.aggressive_fee + self.passive_order_payout;
        aggressive.max(self.passive_fee)
    }

    /// Fee rate charged to a market order, which always takes liquidity
    pub fn market_fee_rate(&self) -> Decimal {
        self.aggressive_fee
    }
}
