//! Outbound push-channel envelopes
//!
//! Every subscriber receives the same JSON-shaped envelopes:
//! `{"type": "...", "data": {...}}`.

use serde::Serialize;
use std::collections::HashMap;

use super::model::{ClosedTrade, Position, Quote};

/// Lifecycle tag attached to a trade event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeLifecycle {
    Open,
    Closed,
}

/// Payload of a `TRADE_UPDATE` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeUpdate {
    pub trade: TradeBody,
    #[serde(rename = "type")]
    pub lifecycle: TradeLifecycle,
}

/// Either side of the position lifecycle, serialized by shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TradeBody {
    Open(Position),
    Closed(ClosedTrade),
}

/// Payload of a `SYSTEM_STATUS` event, published every evaluation tick
/// whether or not a trade occurred.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub instrument: String,
    pub oscillator: f64,
    pub confidence: f64,
}

/// Event fanned out to all connected subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    #[serde(rename = "MARKET_UPDATE")]
    MarketUpdate(HashMap<String, Quote>),
    #[serde(rename = "TRADE_UPDATE")]
    TradeUpdate(TradeUpdate),
    #[serde(rename = "SYSTEM_STATUS")]
    SystemStatus(SystemStatus),
}

impl PushEvent {
    pub fn trade_opened(position: Position) -> Self {
        PushEvent::TradeUpdate(TradeUpdate {
            trade: TradeBody::Open(position),
            lifecycle: TradeLifecycle::Open,
        })
    }

    pub fn trade_closed(trade: ClosedTrade) -> Self {
        PushEvent::TradeUpdate(TradeUpdate {
            trade: TradeBody::Closed(trade),
            lifecycle: TradeLifecycle::Closed,
        })
    }
}
