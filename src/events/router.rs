//! Pure subject derivation: `payload -> subject`.

use super::payload::EventPayload;

pub fn subject_for(payload: &EventPayload) -> String {
    match payload {
        EventPayload::OrderSubmitted { .. } => "orders.accepted".to_string(),
        EventPayload::OrderRejected { .. } => "orders.rejected".to_string(),
        EventPayload::OrderFilled { .. } => "orders.filled".to_string(),
        EventPayload::OrderCancelled { .. } => "orders.cancelled".to_string(),
        EventPayload::PositionDelta { .. } => "positions.update".to_string(),
        EventPayload::PriceUpdate { instrument_id, .. } => {
            format!("market.data.quote.{instrument_id}")
        }
        EventPayload::TradeExecuted { instrument_id, .. } => {
            format!("market.data.trade.{instrument_id}")
        }
        EventPayload::OhlcvBar {
            instrument_id,
            interval,
            ..
        } => format!("market.bars.{instrument_id}.{interval}"),
        EventPayload::RiskCheckResult { order_id, .. } => {
            format!("risk.check_response.{order_id}")
        }
        EventPayload::OrderNotFound { .. } => "orders.errors".to_string(),
    }
}

/// Extra subjects a payload is mirrored onto besides its primary
/// [`subject_for`] subject. Only `RiskCheckResult` has one today: it is
/// additionally broadcast on `risk.events` so anything subscribed to the
/// whole risk stream sees it without per-order subscriptions.
pub fn mirror_subjects_for(payload: &EventPayload) -> Vec<String> {
    match payload {
        EventPayload::RiskCheckResult { .. } => vec!["risk.events".to_string()],
        _ => Vec::new(),
    }
}
