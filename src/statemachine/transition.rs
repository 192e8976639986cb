//! The order transition table, as a pure function.
//!
//! Total: for every `(status, event)` pair the function returns either
//! `Ok((new_order, effects))` or `Err(TransitionError)` — it never panics
//! (see the totality property test at the bottom of this module).

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::order::{Order, OrderStatus};
use crate::events::EventPayload;

use super::effect::Effect;

/// An event driving an order transition.
#[derive(Debug, Clone)]
pub enum Event {
    Fill {
        qty: f64,
        price: f64,
        at: DateTime<Utc>,
    },
    Cancel {
        at: DateTime<Utc>,
    },
    Reject {
        reason: String,
        at: DateTime<Utc>,
    },
    Amend {
        new_qty: f64,
        new_price: Option<f64>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransitionError {
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("amended quantity {0} is below already-filled quantity {1}")]
    InsufficientQuantity(f64, f64),
}

/// Apply `event` to `order`, returning the new order plus the effects the
/// caller must publish once the transition is committed. Never mutates
/// `order` in place — the caller decides when (and whether) to replace the
/// book entry.
pub fn transition(
    order: &Order,
    event: Event,
) -> Result<(Order, Vec<Effect>), TransitionError> {
    match (&order.status, event) {
        (OrderStatus::New, Event::Fill { qty, price, at }) => {
            Ok(apply_fill(order, 0.0, qty, price, at))
        }
        (OrderStatus::PartiallyFilled { filled_qty, .. }, Event::Fill { qty, price, at }) => {
            Ok(apply_fill(order, *filled_qty, qty, price, at))
        }

        (OrderStatus::New, Event::Cancel { at }) | (OrderStatus::PartiallyFilled { .. }, Event::Cancel { at }) => {
            let mut new_order = order.clone();
            new_order.status = OrderStatus::Cancelled;
            new_order.updated_at = at;
            let effects = vec![Effect::Publish(EventPayload::OrderCancelled {
                order_id: order.id.clone(),
                timestamp: at,
            })];
            Ok((new_order, effects))
        }
        (OrderStatus::Cancelled, Event::Cancel { .. }) => {
            // Idempotent: same order, no side effects.
            Ok((order.clone(), Vec::new()))
        }

        (OrderStatus::New, Event::Reject { reason, at }) => {
            if reason.is_empty() {
                return Err(TransitionError::InvalidTransition(
                    "rejection reason must not be empty".to_string(),
                ));
            }
            let mut new_order = order.clone();
            new_order.status = OrderStatus::Rejected { reason: reason.clone() };
            new_order.updated_at = at;
            let effects = vec![Effect::Publish(EventPayload::OrderRejected {
                order_id: order.id.clone(),
                reason,
                timestamp: at,
            })];
            Ok((new_order, effects))
        }

        (OrderStatus::New, Event::Amend { new_qty, new_price, at })
        | (OrderStatus::PartiallyFilled { .. }, Event::Amend { new_qty, new_price, at }) => {
            let filled = order.status.filled_qty();
            if new_qty < filled {
                return Err(TransitionError::InsufficientQuantity(new_qty, filled));
            }
            let mut new_order = order.clone();
            new_order.quantity = new_qty;
            if let Some(price) = new_price {
                new_order.order_type = amend_price(&new_order.order_type, price);
            }
            new_order.updated_at = at;
            Ok((new_order, Vec::new()))
        }

        (OrderStatus::PartiallyFilled { .. }, Event::Reject { .. }) => {
            Err(TransitionError::InvalidTransition(format!(
                "order {} is partially filled and can no longer be rejected",
                order.id
            )))
        }

        (OrderStatus::Rejected { .. }, _) | (OrderStatus::Filled { .. }, _) => {
            Err(TransitionError::InvalidTransition(format!(
                "order {} is in a terminal state ({:?}) and accepts no further events",
                order.id, order.status
            )))
        }
        (OrderStatus::Cancelled, _) => Err(TransitionError::InvalidTransition(format!(
            "order {} is cancelled and accepts no further events except idempotent cancel",
            order.id
        ))),
    }
}

fn apply_fill(
    order: &Order,
    already_filled: f64,
    qty: f64,
    price: f64,
    at: DateTime<Utc>,
) -> (Order, Vec<Effect>) {
    let total_filled = already_filled + qty;
    let mut new_order = order.clone();
    new_order.status = if total_filled >= order.quantity {
        OrderStatus::Filled {
            filled_qty: order.quantity,
            avg_price: price,
        }
    } else {
        OrderStatus::PartiallyFilled {
            filled_qty: total_filled,
            avg_price: price,
        }
    };
    new_order.updated_at = at;

    let effects = vec![
        Effect::Publish(EventPayload::OrderFilled {
            order_id: order.id.clone(),
            fill_qty: qty,
            fill_price: price,
            timestamp: at,
        }),
        Effect::Publish(EventPayload::PositionDelta {
            instrument_id: order.instrument_id.clone(),
            quantity: qty,
            side: order.side,
        }),
    ];

    (new_order, effects)
}

fn amend_price(
    order_type: &crate::domain::order::OrderType,
    new_price: f64,
) -> crate::domain::order::OrderType {
    use crate::domain::order::OrderType;
    match order_type {
        OrderType::Market => OrderType::Market,
        OrderType::Limit { .. } => OrderType::Limit { price: new_price },
        OrderType::Stop { .. } => OrderType::Stop { trigger: new_price },
        OrderType::StopLimit { trigger, .. } => OrderType::StopLimit {
            trigger: *trigger,
            limit: new_price,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderType, Side};
    use crate::ids::{ClientId, InstrumentId, OrderId};

    fn new_order(quantity: f64) -> Order {
        Order::new(
            OrderId::new("o1"),
            ClientId::new("c1"),
            InstrumentId::new("AAPL"),
            Side::Buy,
            OrderType::Limit { price: 150.0 },
            quantity,
            Utc::now(),
        )
    }

    #[test]
    fn partial_fill_then_full_fill_happy_path() {
        let order = new_order(100.0);
        let (order, effects) = transition(
            &order,
            Event::Fill { qty: 40.0, price: 149.5, at: Utc::now() },
        )
        .unwrap();
        assert_eq!(
            order.status,
            OrderStatus::PartiallyFilled { filled_qty: 40.0, avg_price: 149.5 }
        );
        assert_eq!(effects.len(), 2);

        let (order, _) = transition(
            &order,
            Event::Fill { qty: 60.0, price: 149.7, at: Utc::now() },
        )
        .unwrap();
        assert_eq!(
            order.status,
            OrderStatus::Filled { filled_qty: 100.0, avg_price: 149.7 }
        );
    }

    #[test]
    fn overfill_lands_in_filled_with_requested_fill_qty_on_the_event() {
        let order = new_order(100.0);
        let (order, effects) = transition(
            &order,
            Event::Fill { qty: 150.0, price: 149.0, at: Utc::now() },
        )
        .unwrap();
        assert_eq!(
            order.status,
            OrderStatus::Filled { filled_qty: 100.0, avg_price: 149.0 }
        );
        let Effect::Publish(EventPayload::OrderFilled { fill_qty, .. }) = &effects[0] else {
            panic!("expected OrderFilled");
        };
        assert_eq!(*fill_qty, 150.0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let order = new_order(100.0);
        let (cancelled, effects) = transition(&order, Event::Cancel { at: Utc::now() }).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(effects.len(), 1);

        let (again, effects_again) =
            transition(&cancelled, Event::Cancel { at: Utc::now() }).unwrap();
        assert_eq!(again.status, OrderStatus::Cancelled);
        assert!(effects_again.is_empty());
    }

    #[test]
    fn cancel_races_fill_after_cancel_is_rejected() {
        let order = new_order(100.0);
        let (cancelled, _) = transition(&order, Event::Cancel { at: Utc::now() }).unwrap();
        let err = transition(
            &cancelled,
            Event::Fill { qty: 10.0, price: 1.0, at: Utc::now() },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn reject_requires_new_state_and_nonempty_reason() {
        let order = new_order(100.0);
        let (rejected, effects) = transition(
            &order,
            Event::Reject { reason: "no buying power".to_string(), at: Utc::now() },
        )
        .unwrap();
        assert!(matches!(rejected.status, OrderStatus::Rejected { .. }));
        assert_eq!(effects.len(), 1);

        let err = transition(
            &order,
            Event::Reject { reason: "".to_string(), at: Utc::now() },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn reject_is_rejected_once_partially_filled() {
        let order = new_order(100.0);
        let (partial, _) = transition(
            &order,
            Event::Fill { qty: 40.0, price: 149.5, at: Utc::now() },
        )
        .unwrap();
        let err = transition(
            &partial,
            Event::Reject { reason: "late".to_string(), at: Utc::now() },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition(_)));
    }

    #[test]
    fn amend_below_filled_quantity_is_rejected() {
        let order = new_order(100.0);
        let (partial, _) = transition(
            &order,
            Event::Fill { qty: 40.0, price: 149.5, at: Utc::now() },
        )
        .unwrap();
        let err = transition(
            &partial,
            Event::Amend { new_qty: 30.0, new_price: None, at: Utc::now() },
        )
        .unwrap_err();
        assert_eq!(err, TransitionError::InsufficientQuantity(30.0, 40.0));
    }

    #[test]
    fn amend_updates_quantity_and_price_with_no_side_effects() {
        let order = new_order(100.0);
        let (amended, effects) = transition(
            &order,
            Event::Amend { new_qty: 120.0, new_price: Some(151.0), at: Utc::now() },
        )
        .unwrap();
        assert_eq!(amended.quantity, 120.0);
        assert_eq!(amended.order_type, OrderType::Limit { price: 151.0 });
        assert!(effects.is_empty());
    }

    #[test]
    fn terminal_states_reject_every_event() {
        let order = new_order(100.0);
        let (filled, _) = transition(
            &order,
            Event::Fill { qty: 100.0, price: 150.0, at: Utc::now() },
        )
        .unwrap();

        for event in [
            Event::Fill { qty: 1.0, price: 1.0, at: Utc::now() },
            Event::Cancel { at: Utc::now() },
            Event::Reject { reason: "x".into(), at: Utc::now() },
            Event::Amend { new_qty: 1.0, new_price: None, at: Utc::now() },
        ] {
            assert!(transition(&filled, event).is_err());
        }
    }

    #[test]
    fn totality_every_status_event_pair_returns_a_result_never_panics() {
        let statuses = [
            OrderStatus::New,
            OrderStatus::PartiallyFilled { filled_qty: 10.0, avg_price: 1.0 },
            OrderStatus::Filled { filled_qty: 100.0, avg_price: 1.0 },
            OrderStatus::Cancelled,
            OrderStatus::Rejected { reason: "x".into() },
        ];
        for status in statuses {
            let mut order = new_order(100.0);
            order.status = status;
            for event in [
                Event::Fill { qty: 1.0, price: 1.0, at: Utc::now() },
                Event::Cancel { at: Utc::now() },
                Event::Reject { reason: "x".into(), at: Utc::now() },
                Event::Amend { new_qty: 1.0, new_price: None, at: Utc::now() },
            ] {
                let _ = transition(&order, event);
            }
        }
    }
}
