//! Every domain event payload, as one `#[serde(tag = "type")]` sum type.
//! The `type` discriminant is the serde tag, not a duplicated field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Side;
use crate::ids::{InstrumentId, OrderId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    OrderSubmitted {
        order_id: OrderId,
        instrument: InstrumentId,
        quantity: f64,
        timestamp: DateTime<Utc>,
    },
    OrderRejected {
        order_id: OrderId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    OrderFilled {
        order_id: OrderId,
        fill_qty: f64,
        fill_price: f64,
        timestamp: DateTime<Utc>,
    },
    OrderCancelled {
        order_id: OrderId,
        timestamp: DateTime<Utc>,
    },
    PositionDelta {
        instrument_id: InstrumentId,
        quantity: f64,
        side: Side,
    },
    PriceUpdate {
        instrument_id: InstrumentId,
        bid: f64,
        ask: f64,
        timestamp: DateTime<Utc>,
    },
    TradeExecuted {
        instrument_id: InstrumentId,
        price: f64,
        size: f64,
        timestamp: DateTime<Utc>,
    },
    OhlcvBar {
        instrument_id: InstrumentId,
        interval: String,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        vwap: f64,
        trade_count: u64,
        open_ts: DateTime<Utc>,
        close_ts: DateTime<Utc>,
        sequence: u64,
    },
    RiskCheckResult {
        order_id: OrderId,
        passed: bool,
        result: String,
        timestamp: DateTime<Utc>,
    },
    OrderNotFound {
        order_id: OrderId,
        reason: String,
    },
}
