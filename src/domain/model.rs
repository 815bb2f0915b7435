//! Domain types for the signal-and-execution pipeline
//!
//! Prices, pnl and confidence are plain f64: the confidence heuristic and the
//! pnl formula are defined in binary floating point and downstream consumers
//! (dashboard, stats endpoint) expect those exact values.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A normalized inbound price update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub instrument: String,
    pub price: f64,
    /// Upstream event time, epoch milliseconds.
    pub time: i64,
}

/// Latest known price for one instrument, as stored in the price table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub time: i64,
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Entry decision for one instrument on one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    None,
    OpenBuy,
    OpenSell,
}

/// Ephemeral evaluation output, produced once per tick per instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub instrument: String,
    pub action: SignalAction,
    pub confidence: f64,
}

/// Indicator values for one instrument. `None` means the window does not yet
/// hold enough samples for that lookback (a "no decision yet" state, not an
/// error).
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub instrument: String,
    pub oscillator: Option<f64>,
    pub moving_average: Option<f64>,
}

/// An open position. At most one exists per instrument at any time; the
/// ledger enforces that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Uuid,
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub size: f64,
    pub opened_at_ms: i64,
    pub confidence: f64,
    /// Opaque settlement receipt returned by the execution router.
    pub execution_ref: String,
}

impl Position {
    /// Realized pnl if the position were closed at `exit_price`.
    pub fn pnl(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Buy => (exit_price - self.entry_price) * self.size,
            Side::Sell => (self.entry_price - exit_price) * self.size,
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    #[serde(rename = "Stop Loss")]
    StopLoss,
    #[serde(rename = "Take Profit")]
    TakeProfit,
    #[serde(rename = "Signal Flip")]
    SignalFlip,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::StopLoss => write!(f, "Stop Loss"),
            CloseReason::TakeProfit => write!(f, "Take Profit"),
            CloseReason::SignalFlip => write!(f, "Signal Flip"),
        }
    }
}

/// A completed round trip. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedTrade {
    #[serde(flatten)]
    pub position: Position,
    pub exit_price: f64,
    pub closed_at_ms: i64,
    pub pnl: f64,
    pub close_reason: CloseReason,
    pub close_execution_ref: String,
}

/// Aggregate statistics over the closed-trade history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStats {
    pub total_trades: usize,
    /// Fraction of closed trades with pnl > 0; 0 when there are none.
    pub win_rate: f64,
    pub total_pn_l: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: Side, entry: f64) -> Position {
        Position {
            id: Uuid::new_v4(),
            instrument: "BTCUSDT".to_string(),
            side,
            entry_price: entry,
            size: 0.1,
            opened_at_ms: 0,
            confidence: 0.9,
            execution_ref: "0xabc".to_string(),
        }
    }

    #[test]
    fn pnl_sign_matches_direction() {
        let long = position(Side::Buy, 100.0);
        assert!(long.pnl(105.0) > 0.0);
        assert!(long.pnl(95.0) < 0.0);

        let short = position(Side::Sell, 100.0);
        assert!(short.pnl(95.0) > 0.0);
        assert!(short.pnl(105.0) < 0.0);
    }

    #[test]
    fn pnl_scales_with_size() {
        let mut long = position(Side::Buy, 100.0);
        long.size = 2.0;
        assert_eq!(long.pnl(103.0), 6.0);
    }

    #[test]
    fn close_reason_serializes_as_display_string() {
        let json = serde_json::to_string(&CloseReason::StopLoss).unwrap();
        assert_eq!(json, "\"Stop Loss\"");
        assert_eq!(CloseReason::SignalFlip.to_string(), "Signal Flip");
    }

    #[test]
    fn closed_trade_flattens_position_fields() {
        let pos = position(Side::Buy, 100.0);
        let trade = ClosedTrade {
            pnl: pos.pnl(101.0),
            position: pos,
            exit_price: 101.0,
            closed_at_ms: 1,
            close_reason: CloseReason::TakeProfit,
            close_execution_ref: "0xdef".to_string(),
        };
        let value = serde_json::to_value(&trade).unwrap();
        assert_eq!(value["instrument"], "BTCUSDT");
        assert_eq!(value["entryPrice"], 100.0);
        assert_eq!(value["closeReason"], "Take Profit");
        assert_eq!(value["side"], "BUY");
    }
}
