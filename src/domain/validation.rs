//! Pre-trade validation pipeline: five ordered checks, first failure wins.

use thiserror::Error;

use super::order::{Order, OrderType, Side};
use crate::ids::InstrumentId;

/// Per-account validation rules, looked up by the OMS before running the
/// pipeline on an inbound order.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub max_quantity: f64,
    pub valid_symbols: Vec<InstrumentId>,
    pub buying_power: f64,
    pub allow_market_orders: bool,
    pub min_price: f64,
    pub max_price: f64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_quantity: f64::MAX,
            valid_symbols: Vec::new(),
            buying_power: f64::MAX,
            allow_market_orders: true,
            min_price: 0.0,
            max_price: f64::MAX,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is not a finite, non-NaN value: {1}")]
    NonFiniteValue(&'static str, f64),
    #[error("quantity {0} exceeds max_quantity {1}")]
    MaxQuantityExceeded(f64, f64),
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
    #[error("market orders are not allowed for this account")]
    InvalidOrderType,
    #[error("price {0} is out of the allowed range")]
    InvalidPrice(f64),
    #[error("required buying power {0} exceeds available {1}")]
    InsufficientBuyingPower(f64, f64),
}

/// Run the five-step pipeline in order, returning the first failure.
///
/// Ahead of the five documented steps, every numeric field the order
/// carries (quantity and any price legs) is checked for finiteness — a
/// type-level guard rather than a business rule, so it always runs first
/// and isn't counted among the five.
pub fn validate(order: &Order, rules: &ValidationRules) -> Result<(), ValidationError> {
    if !order.quantity.is_finite() {
        return Err(ValidationError::NonFiniteValue("quantity", order.quantity));
    }
    for price in price_legs(&order.order_type) {
        if !price.is_finite() {
            return Err(ValidationError::NonFiniteValue("price", price));
        }
    }

    if order.quantity > rules.max_quantity {
        return Err(ValidationError::MaxQuantityExceeded(
            order.quantity,
            rules.max_quantity,
        ));
    }

    if !rules.valid_symbols.is_empty() && !rules.valid_symbols.contains(&order.instrument_id) {
        return Err(ValidationError::InvalidSymbol(
            order.instrument_id.as_str().to_string(),
        ));
    }

    if matches!(order.order_type, OrderType::Market) && !rules.allow_market_orders {
        return Err(ValidationError::InvalidOrderType);
    }

    for price in price_legs(&order.order_type) {
        if price < rules.min_price || price > rules.max_price {
            return Err(ValidationError::InvalidPrice(price));
        }
    }

    if order.side == Side::Buy {
        let reference_price = order.order_type.reference_price();
        let required = order.quantity * reference_price;
        if required > rules.buying_power {
            return Err(ValidationError::InsufficientBuyingPower(
                required,
                rules.buying_power,
            ));
        }
    }

    Ok(())
}

/// The price legs that must fall within `[min_price, max_price]`: none for
/// Market, one for Limit/Stop, both for StopLimit.
fn price_legs(order_type: &OrderType) -> Vec<f64> {
    match order_type {
        OrderType::Market => Vec::new(),
        OrderType::Limit { price } => vec![*price],
        OrderType::Stop { trigger } => vec![*trigger],
        OrderType::StopLimit { trigger, limit } => vec![*trigger, *limit],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ClientId, OrderId};
    use chrono::Utc;

    fn order(side: Side, order_type: OrderType, quantity: f64) -> Order {
        Order::new(
            OrderId::new("o1"),
            ClientId::new("c1"),
            InstrumentId::new("AAPL"),
            side,
            order_type,
            quantity,
            Utc::now(),
        )
    }

    fn rules() -> ValidationRules {
        ValidationRules {
            max_quantity: 1000.0,
            valid_symbols: vec![InstrumentId::new("AAPL")],
            buying_power: 100_000.0,
            allow_market_orders: false,
            min_price: 1.0,
            max_price: 1000.0,
        }
    }

    #[test]
    fn happy_path_limit_buy_within_rules() {
        let o = order(Side::Buy, OrderType::Limit { price: 150.0 }, 100.0);
        assert!(validate(&o, &rules()).is_ok());
    }

    #[test]
    fn quantity_over_max_is_rejected_first() {
        let o = order(Side::Buy, OrderType::Limit { price: 150.0 }, 2000.0);
        assert_eq!(
            validate(&o, &rules()),
            Err(ValidationError::MaxQuantityExceeded(2000.0, 1000.0))
        );
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let mut o = order(Side::Buy, OrderType::Limit { price: 150.0 }, 10.0);
        o.instrument_id = InstrumentId::new("MSFT");
        assert_eq!(
            validate(&o, &rules()),
            Err(ValidationError::InvalidSymbol("MSFT".to_string()))
        );
    }

    #[test]
    fn market_orders_rejected_when_disallowed() {
        let o = order(Side::Buy, OrderType::Market, 10.0);
        assert_eq!(validate(&o, &rules()), Err(ValidationError::InvalidOrderType));
    }

    #[test]
    fn price_out_of_range_is_rejected() {
        let o = order(Side::Buy, OrderType::Limit { price: 1.0 }, 10.0);
        let mut r = rules();
        r.min_price = 10.0;
        assert_eq!(validate(&o, &r), Err(ValidationError::InvalidPrice(1.0)));
    }

    #[test]
    fn stop_limit_checks_both_legs() {
        let o = order(
            Side::Buy,
            OrderType::StopLimit { trigger: 150.0, limit: 5000.0 },
            10.0,
        );
        assert_eq!(validate(&o, &rules()), Err(ValidationError::InvalidPrice(5000.0)));
    }

    #[test]
    fn buy_checks_buying_power_sell_does_not() {
        let buy = order(Side::Buy, OrderType::Limit { price: 150.0 }, 1000.0);
        assert_eq!(
            validate(&buy, &rules()),
            Err(ValidationError::InsufficientBuyingPower(150_000.0, 100_000.0))
        );

        let sell = order(Side::Sell, OrderType::Limit { price: 150.0 }, 1000.0);
        assert!(validate(&sell, &rules()).is_ok());
    }

    #[test]
    fn non_finite_quantity_or_price_is_rejected_before_the_five_step_pipeline() {
        let nan_qty = order(Side::Buy, OrderType::Limit { price: 150.0 }, f64::NAN);
        assert!(matches!(
            validate(&nan_qty, &rules()),
            Err(ValidationError::NonFiniteValue("quantity", q)) if q.is_nan()
        ));

        let inf_price = order(Side::Buy, OrderType::Limit { price: f64::INFINITY }, 10.0);
        assert_eq!(
            validate(&inf_price, &rules()),
            Err(ValidationError::NonFiniteValue("price", f64::INFINITY))
        );
    }

    #[test]
    fn tightening_a_rule_never_converts_err_to_ok() {
        let o = order(Side::Buy, OrderType::Limit { price: 150.0 }, 500.0);
        let loose = rules();
        assert!(validate(&o, &loose).is_ok());

        let mut tight = loose.clone();
        tight.max_quantity = 100.0;
        assert!(validate(&o, &tight).is_err());
    }
}
