//! JSON shapes the OMS accepts on its three inbound subjects.

use serde::Deserialize;

use crate::domain::order::OrderType;
use crate::domain::Side;
use crate::ids::{ClientId, InstrumentId, OrderId};

/// `orders.new`: `{order: <Order>, account_id}`. A client-supplied `id` is
/// optional — the service assigns one if absent.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderRequest {
    pub order: OrderSubmission,
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSubmission {
    #[serde(default)]
    pub id: Option<OrderId>,
    pub client_id: ClientId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
}

/// `orders.fill`: `{order_id, fill_qty, fill_price}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FillRequest {
    pub order_id: OrderId,
    pub fill_qty: f64,
    pub fill_price: f64,
}

/// `orders.cancel`: `{order_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub order_id: OrderId,
}
