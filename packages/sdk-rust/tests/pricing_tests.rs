//! Pricing engine tests
//!
//! Exact rounding cases plus the safety bounds every quote must respect.

use dex_sdk::pricing::{
    auto_slippage, quote_limit_order, quote_market_order, try_quote_limit_order, BuyLimitQuote,
    LimitOrderQuote, LimitOrderRequest, MarketOrderRequest, SellLimitQuote,
};
use dex_sdk::{AmountSide, MarketConfig, OrderbookLevel, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn market() -> MarketConfig {
    MarketConfig {
        id: "WETH/USDC".to_string(),
        token_x_scaling_factor: 5,
        token_y_scaling_factor: 9,
        price_scaling_factor: 4,
        aggressive_fee: dec!(0.0003),
        passive_fee: dec!(0),
        passive_order_payout: dec!(0.00005),
    }
}

fn limit<'a>(price: &'a str, amount: &'a str, side: Side, amount_side: AmountSide) -> LimitOrderRequest<'a> {
    LimitOrderRequest {
        price,
        amount,
        side,
        amount_side,
    }
}

fn level(price: Decimal, size: Decimal) -> OrderbookLevel {
    OrderbookLevel { price, size }
}

fn asks() -> Vec<OrderbookLevel> {
    vec![
        level(dec!(1.00), dec!(5)),
        level(dec!(1.02), dec!(5)),
        level(dec!(1.10), dec!(5)),
    ]
}

// ============================================================================
// Limit orders
// ============================================================================

#[test]
fn test_buy_base_reference_case() {
    let quote = quote_limit_order(&limit("0.9", "10", Side::Buy, AmountSide::Base), &market());
    assert_eq!(
        quote,
        LimitOrderQuote::Buy(BuyLimitQuote {
            price: dec!(0.9),
            max_fee: dec!(0.00315),
            token_x_receive: dec!(10),
            min_token_y_pay: dec!(9),
            max_token_y_pay: dec!(9.00315),
        })
    );
}

#[test]
fn test_degenerate_inputs_give_zero_quotes() {
    let m = market();
    for (price, amount) in [("", "10"), ("0.9", ""), ("abc", "10"), ("0.9", "1O"), ("0", "10"), ("0.9", "-3")] {
        for side in [Side::Buy, Side::Sell] {
            for amount_side in [AmountSide::Base, AmountSide::Quote] {
                let request = limit(price, amount, side, amount_side);
                let quote = quote_limit_order(&request, &m);
                assert!(quote.is_zero(), "{:?} priced to {:?}", request, quote);
                assert_eq!(quote.side(), side);
                assert!(try_quote_limit_order(&request, &m).is_none());
            }
        }
    }
}

#[test]
fn test_price_below_tick_is_degenerate() {
    // Rounds down to zero at four decimals
    let quote = quote_limit_order(&limit("0.00004", "10", Side::Sell, AmountSide::Base), &market());
    assert!(quote.is_zero());
}

#[test]
fn test_limit_bounds_never_favour_the_caller() {
    let m = market();
    let fee = m.limit_fee_rate();
    let prices = ["0.9", "1.23456", "2500.5", "0.0001", "77.7777"];
    let amounts = ["10", "0.333333", "1.5", "12345.678901", "0.00001"];

    for price in prices {
        for amount in amounts {
            let p: Decimal = price.parse().unwrap();

            if let LimitOrderQuote::Buy(q) =
                quote_limit_order(&limit(price, amount, Side::Buy, AmountSide::Base), &m)
            {
                let exact = q.price * q.token_x_receive * (Decimal::ONE + fee);
                assert!(q.max_token_y_pay >= exact, "buy/base {} {}: {:?}", price, amount, q);
                assert!(q.max_fee >= q.min_token_y_pay * fee);
                assert!(q.price <= p);
            }

            if let LimitOrderQuote::Buy(q) =
                quote_limit_order(&limit(price, amount, Side::Buy, AmountSide::Quote), &m)
            {
                assert!(q.token_x_receive * q.price <= q.min_token_y_pay, "buy/quote {} {}: {:?}", price, amount, q);
                assert!(q.max_token_y_pay <= amount.parse::<Decimal>().unwrap());
                assert!(q.max_fee >= q.min_token_y_pay * fee);
            }

            if let LimitOrderQuote::Sell(q) =
                quote_limit_order(&limit(price, amount, Side::Sell, AmountSide::Base), &m)
            {
                let exact = q.price * q.token_x_pay * (Decimal::ONE - fee);
                assert!(q.min_token_y_receive <= exact, "sell/base {} {}: {:?}", price, amount, q);
                assert!(q.max_fee >= q.max_token_y_receive * fee);
            }

            if let LimitOrderQuote::Sell(q) =
                quote_limit_order(&limit(price, amount, Side::Sell, AmountSide::Quote), &m)
            {
                assert!(q.token_x_pay * q.price >= q.max_token_y_receive, "sell/quote {} {}: {:?}", price, amount, q);
                assert!(q.max_fee >= q.max_token_y_receive * fee);
            }
        }
    }
}

#[test]
fn test_sell_base_quantizes_each_step() {
    let quote = quote_limit_order(&limit("1.23456", "2.1234567", Side::Sell, AmountSide::Base), &market());
    // price 1.2345, token X 2.12345, gross 2.621399025, fee ceil(0.00091748965875)
    assert_eq!(
        quote,
        LimitOrderQuote::Sell(SellLimitQuote {
            price: dec!(1.2345),
            max_fee: dec!(0.000917490),
            token_x_pay: dec!(2.12345),
            min_token_y_receive: dec!(2.620481535),
            max_token_y_receive: dec!(2.621399025),
        })
    );
}

// ============================================================================
// Market orders
// ============================================================================

#[test]
fn test_buy_base_market_quote() {
    let request = MarketOrderRequest {
        amount: "8",
        side: Side::Buy,
        amount_side: AmountSide::Base,
        slippage_percent: None,
    };
    let quote = quote_market_order(&request, &market(), &asks());

    // Book walk: 5 @ 1.00 + 3 @ 1.02
    assert_eq!(quote.reference_price, dec!(1.00));
    assert_eq!(quote.est_price, dec!(1.0075));
    assert_eq!(quote.est_worst_price, dec!(1.02));
    assert_eq!(quote.est_slippage_percent, dec!(2));
    assert_eq!(quote.auto_slippage_percent, dec!(2.2));
    assert_eq!(quote.slippage_percent, dec!(2.2));

    // Binding figures come from the slippage-adjusted worst price
    assert_eq!(quote.worst_price, dec!(1.022));
    assert_eq!(quote.token_x, dec!(8));
    assert_eq!(quote.max_fee, dec!(0.0024528));
    assert_eq!(quote.token_y, dec!(8.1784528));

    assert_eq!(quote.est_fee, dec!(0.002418));
    assert_eq!(quote.est_token_y, dec!(8.062418));
    assert!(quote.est_token_y <= quote.token_y);
    assert!(!quote.insufficient_liquidity);
}

#[test]
fn test_buy_quote_market_quote() {
    let request = MarketOrderRequest {
        amount: "5.10153",
        side: Side::Buy,
        amount_side: AmountSide::Quote,
        slippage_percent: None,
    };
    let quote = quote_market_order(&request, &market(), &asks());

    // Gross 5.10153 / 1.0003 = 5.1: all of 1.00 plus 0.1 worth of 1.02
    assert_eq!(quote.est_worst_price, dec!(1.02));
    assert_eq!(quote.est_price, dec!(1.0004));
    assert_eq!(quote.worst_price, dec!(1.022));

    assert_eq!(quote.token_y, dec!(5.10153));
    assert_eq!(quote.max_fee, dec!(0.00153));
    // 5.1 / 1.022 = 4.990215..., rounded down
    assert_eq!(quote.token_x, dec!(4.99021));

    assert_eq!(quote.est_fee, dec!(0.00153));
    assert_eq!(quote.est_token_x, dec!(5.09803));
    assert_eq!(quote.est_token_y, dec!(5.10153));
    assert!(!quote.insufficient_liquidity);
}

#[test]
fn test_sell_quote_market_quote() {
    let bids = vec![level(dec!(0.9999), dec!(100))];
    let request = MarketOrderRequest {
        amount: "9.997",
        side: Side::Sell,
        amount_side: AmountSide::Quote,
        slippage_percent: None,
    };
    let quote = quote_market_order(&request, &market(), &bids);

    // Gross 9.997 / 0.9997 = 10
    assert_eq!(quote.auto_slippage_percent, dec!(0.1));
    assert_eq!(quote.worst_price, dec!(0.9989));
    assert_eq!(quote.token_y, dec!(9.997));
    assert_eq!(quote.max_fee, dec!(0.003));
    // 10 / 0.9989 = 10.011012..., rounded up
    assert_eq!(quote.token_x, dec!(10.01102));

    assert_eq!(quote.est_fee, dec!(0.003));
    assert_eq!(quote.est_token_x, dec!(10.00101));
    assert_eq!(quote.est_token_y, dec!(9.997));
}

#[test]
fn test_market_bounds_never_favour_the_caller() {
    let m = market();
    let fee = m.market_fee_rate();
    let bids = vec![
        level(dec!(0.9999), dec!(3)),
        level(dec!(0.97), dec!(4)),
        level(dec!(0.9), dec!(10)),
    ];
    let amounts = ["8", "0.333333", "1.5", "12.345678901", "0.00107", "40"];

    for amount in amounts {
        let input: Decimal = amount.parse().unwrap();
        for slippage_percent in [None, Some(dec!(0.5)), Some(dec!(3))] {
            let request = |side, amount_side| MarketOrderRequest {
                amount,
                side,
                amount_side,
                slippage_percent,
            };

            let q = quote_market_order(&request(Side::Buy, AmountSide::Base), &m, &asks());
            let gross = q.token_y - q.max_fee;
            assert!(q.token_x * q.worst_price <= gross, "buy/base {}: {:?}", amount, q);
            assert!(q.max_fee >= gross * fee, "buy/base {}: {:?}", amount, q);
            assert!(q.token_y >= q.token_x * q.worst_price * (Decimal::ONE + fee));

            let q = quote_market_order(&request(Side::Buy, AmountSide::Quote), &m, &asks());
            assert!(q.token_y <= input, "buy/quote {}: {:?}", amount, q);
            assert!(q.token_x * q.worst_price <= q.token_y, "buy/quote {}: {:?}", amount, q);
            assert!(q.max_fee >= q.token_x * q.worst_price * fee);

            let q = quote_market_order(&request(Side::Sell, AmountSide::Base), &m, &bids);
            assert!(q.token_y + q.max_fee <= q.token_x * q.worst_price, "sell/base {}: {:?}", amount, q);
            assert!(q.token_y <= q.token_x * q.worst_price * (Decimal::ONE - fee));
            assert!(q.max_fee >= (q.token_y + q.max_fee) * fee);

            let q = quote_market_order(&request(Side::Sell, AmountSide::Quote), &m, &bids);
            assert!(q.token_y <= input, "sell/quote {}: {:?}", amount, q);
            assert!(q.token_x * q.worst_price >= q.token_y, "sell/quote {}: {:?}", amount, q);
            assert!(q.max_fee >= q.token_y * fee);
        }
    }
}

#[test]
fn test_explicit_slippage_overrides_auto() {
    let request = MarketOrderRequest {
        amount: "8",
        side: Side::Buy,
        amount_side: AmountSide::Base,
        slippage_percent: Some(dec!(1)),
    };
    let quote = quote_market_order(&request, &market(), &asks());
    assert_eq!(quote.auto_slippage_percent, dec!(2.2));
    assert_eq!(quote.slippage_percent, dec!(1));
    assert_eq!(quote.worst_price, dec!(1.01));
}

#[test]
fn test_sell_market_quote_floors_worst_price() {
    let bids = vec![level(dec!(0.9999), dec!(100))];
    let request = MarketOrderRequest {
        amount: "10",
        side: Side::Sell,
        amount_side: AmountSide::Base,
        slippage_percent: None,
    };
    let quote = quote_market_order(&request, &market(), &bids);

    // No slippage in the book, so the 0.1% floor applies
    assert_eq!(quote.auto_slippage_percent, dec!(0.1));
    // 0.9999 * 0.999 = 0.9989001, floored to 4dp
    assert_eq!(quote.worst_price, dec!(0.9989));
    assert!(quote.token_y <= quote.est_token_y);
}

#[test]
fn test_exhausted_book_is_flagged() {
    let bids = vec![level(dec!(0.9), dec!(2))];
    let request = MarketOrderRequest {
        amount: "5",
        side: Side::Sell,
        amount_side: AmountSide::Base,
        slippage_percent: None,
    };
    let quote = quote_market_order(&request, &market(), &bids);
    assert!(quote.insufficient_liquidity);
    assert_eq!(quote.token_x, dec!(5));
    assert_eq!(quote.est_token_x, dec!(2));
}

#[test]
fn test_market_quote_degenerate_inputs() {
    let m = market();
    for amount in ["", "zero", "0"] {
        let request = MarketOrderRequest {
            amount,
            side: Side::Buy,
            amount_side: AmountSide::Quote,
            slippage_percent: None,
        };
        assert!(quote_market_order(&request, &m, &asks()).is_zero());
    }

    let request = MarketOrderRequest {
        amount: "1",
        side: Side::Buy,
        amount_side: AmountSide::Base,
        slippage_percent: None,
    };
    assert!(quote_market_order(&request, &m, &[]).is_zero());
}

#[test]
fn test_auto_slippage_clamps() {
    assert_eq!(auto_slippage(dec!(0)), dec!(0.1));
    assert_eq!(auto_slippage(dec!(0.01)), dec!(0.1));
    assert_eq!(auto_slippage(dec!(1.5)), dec!(1.7));
    assert_eq!(auto_slippage(dec!(50)), dec!(5));
}
