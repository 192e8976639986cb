//! The order entity: side, order type, status, and the owning record kept
//! in the OMS's in-memory book.
//!
//! Readers outside the OMS only ever see cloned snapshots — the book
//! itself is the sole owner of the live `Order`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, InstrumentId, OrderId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Tagged order type. Limit/Stop/StopLimit carry the price leg(s) a
/// market order doesn't need.
///
/// Kept as a nested object under its own `order_type` field rather than
/// flattened into the containing struct — serde's derive doesn't support
/// `#[serde(flatten)]` together with an internally tagged enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit { price: f64 },
    Stop { trigger: f64 },
    StopLimit { trigger: f64, limit: f64 },
}

impl OrderType {
    /// The price used as the buying-power reference in validation: the
    /// limit leg for `Limit`/`StopLimit`, the trigger for `Stop`, and a
    /// very large sentinel for `Market`.
    pub fn reference_price(&self) -> f64 {
        match self {
            OrderType::Market => f64::MAX / 2.0,
            OrderType::Limit { price } => *price,
            OrderType::Stop { trigger } => *trigger,
            OrderType::StopLimit { limit, .. } => *limit,
        }
    }
}

/// Order lifecycle status. `avg_price` is the *last fill price*, not a
/// true volume-weighted average — documented here rather than silently
/// changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled { filled_qty: f64, avg_price: f64 },
    Filled { filled_qty: f64, avg_price: f64 },
    Cancelled,
    Rejected { reason: String },
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Filled { .. } | OrderStatus::Rejected { .. }
        )
    }

    pub fn filled_qty(&self) -> f64 {
        match self {
            OrderStatus::PartiallyFilled { filled_qty, .. }
            | OrderStatus::Filled { filled_qty, .. } => *filled_qty,
            _ => 0.0,
        }
    }
}

/// An order owned exclusively by the OMS's in-memory book, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: OrderId,
        client_id: ClientId,
        instrument_id: InstrumentId,
        side: Side,
        order_type: OrderType,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            client_id,
            instrument_id,
            side,
            order_type,
            quantity,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        }
    }
}
