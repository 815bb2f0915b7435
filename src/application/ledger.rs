//! Position ledger
//!
//! Authoritative owner of open positions and the closed-trade history. Each
//! instrument slot moves Empty -> Open -> Closed; a closed slot is free to
//! open again. At most one open position exists per instrument.
//!
//! Every open/close goes through the execution router first. On dispatch
//! failure the attempt is abandoned with no partial state and no retry. The
//! resulting trade event is published strictly after the ledger mutation.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{CloseReason, ClosedTrade, LedgerStats, Position, PushEvent, Side};
use crate::infrastructure::{BroadcastHub, ExecutionRouter, RouterError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("execution dispatch failed: {0}")]
    Execution(#[from] RouterError),
}

struct LedgerState {
    open: Vec<Position>,
    history: VecDeque<ClosedTrade>,
}

pub struct PositionLedger {
    router: Arc<ExecutionRouter>,
    hub: Arc<BroadcastHub>,
    state: Mutex<LedgerState>,
    history_cap: usize,
    stop_loss_pct: f64,
    take_profit_pct: f64,
}

impl PositionLedger {
    pub fn new(
        router: Arc<ExecutionRouter>,
        hub: Arc<BroadcastHub>,
        history_cap: usize,
        stop_loss_pct: f64,
        take_profit_pct: f64,
    ) -> Self {
        PositionLedger {
            router,
            hub,
            state: Mutex::new(LedgerState {
                open: Vec::new(),
                history: VecDeque::new(),
            }),
            history_cap,
            stop_loss_pct,
            take_profit_pct,
        }
    }

    /// Open a position. A second open for an instrument that already has one
    /// is a defensive no-op (`Ok(None)`) checked before any dispatch.
    pub async fn open(
        &self,
        instrument: &str,
        side: Side,
        price: f64,
        size: f64,
        confidence: f64,
    ) -> Result<Option<Position>, LedgerError> {
        if self.open_for(instrument).is_some() {
            tracing::debug!(instrument, "open skipped: position already exists");
            return Ok(None);
        }

        let receipt = self
            .router
            .dispatch(
                "executeTrade",
                &json!({
                    "symbol": instrument,
                    "side": side,
                    "price": price,
                    "size": size,
                }),
            )
            .await?;
        tracing::info!(instrument, ?side, price, reference = %receipt.reference, "trade executed");

        let position = Position {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            side,
            entry_price: price,
            size,
            opened_at_ms: Utc::now().timestamp_millis(),
            confidence,
            execution_ref: receipt.reference,
        };

        {
            let mut state = self.state.lock();
            // Re-check under the lock: the slot must still be empty.
            if state.open.iter().any(|p| p.instrument == instrument) {
                tracing::warn!(instrument, "open raced an existing position, dropping");
                return Ok(None);
            }
            state.open.push(position.clone());
        }

        self.hub.publish(PushEvent::trade_opened(position.clone()));
        Ok(Some(position))
    }

    /// Close a position. On dispatch failure the position stays open
    /// untouched. Returns `Ok(None)` if the position is no longer in the
    /// open set by the time the settlement resolves.
    pub async fn close(
        &self,
        position: &Position,
        exit_price: f64,
        reason: CloseReason,
    ) -> Result<Option<ClosedTrade>, LedgerError> {
        let receipt = self
            .router
            .dispatch(
                "closePosition",
                &json!({
                    "id": position.id,
                    "exitPrice": exit_price,
                }),
            )
            .await?;

        let trade = ClosedTrade {
            pnl: position.pnl(exit_price),
            position: position.clone(),
            exit_price,
            closed_at_ms: Utc::now().timestamp_millis(),
            close_reason: reason,
            close_execution_ref: receipt.reference,
        };

        {
            let mut state = self.state.lock();
            let Some(idx) = state.open.iter().position(|p| p.id == position.id) else {
                return Ok(None);
            };
            state.open.remove(idx);
            state.history.push_front(trade.clone());
            state.history.truncate(self.history_cap);
        }

        tracing::info!(
            instrument = %position.instrument,
            pnl = trade.pnl,
            reason = %reason,
            "position closed"
        );
        self.hub.publish(PushEvent::trade_closed(trade.clone()));
        Ok(Some(trade))
    }

    /// Evaluate stop-loss / take-profit for the instrument's open position,
    /// if any. Stop-loss is checked first; the two cannot both hold since
    /// the thresholds sit on opposite sides of the entry price.
    pub async fn check_exits(
        &self,
        instrument: &str,
        price: f64,
    ) -> Result<Option<ClosedTrade>, LedgerError> {
        let Some(position) = self.open_for(instrument) else {
            return Ok(None);
        };

        let reason = match position.side {
            Side::Buy => {
                if price <= position.entry_price * (1.0 - self.stop_loss_pct) {
                    Some(CloseReason::StopLoss)
                } else if price >= position.entry_price * (1.0 + self.take_profit_pct) {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
            Side::Sell => {
                if price >= position.entry_price * (1.0 + self.stop_loss_pct) {
                    Some(CloseReason::StopLoss)
                } else if price <= position.entry_price * (1.0 - self.take_profit_pct) {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
        };

        match reason {
            Some(reason) => self.close(&position, price, reason).await,
            None => Ok(None),
        }
    }

    pub fn open_for(&self, instrument: &str) -> Option<Position> {
        self.state
            .lock()
            .open
            .iter()
            .find(|p| p.instrument == instrument)
            .cloned()
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.state.lock().open.clone()
    }

    /// Closed trades, most recent first.
    pub fn trade_history(&self) -> Vec<ClosedTrade> {
        self.state.lock().history.iter().cloned().collect()
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.state.lock();
        let total = state.history.len();
        let wins = state.history.iter().filter(|t| t.pnl > 0.0).count();
        LedgerStats {
            total_trades: total,
            win_rate: if total > 0 {
                wins as f64 / total as f64
            } else {
                0.0
            },
            total_pn_l: state.history.iter().map(|t| t.pnl).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ledger() -> PositionLedger {
        let router = Arc::new(ExecutionRouter::with_default_facets());
        let hub = Arc::new(BroadcastHub::new(64, Duration::from_millis(100)));
        PositionLedger::new(router, hub, 3, 0.02, 0.05)
    }

    #[tokio::test]
    async fn open_then_close_round_trip() {
        let ledger = ledger();
        let position = ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap()
            .unwrap();
        assert!(position.execution_ref.starts_with("0x"));
        assert_eq!(ledger.open_positions().len(), 1);

        let trade = ledger
            .close(&position, 105.0, CloseReason::TakeProfit)
            .await
            .unwrap()
            .unwrap();
        assert!((trade.pnl - 0.5).abs() < 1e-9);
        assert!(ledger.open_positions().is_empty());
        assert_eq!(ledger.trade_history().len(), 1);
    }

    #[tokio::test]
    async fn second_open_for_instrument_is_a_noop() {
        let ledger = ledger();
        ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap();
        let second = ledger
            .open("BTCUSDT", Side::Sell, 101.0, 0.1, 0.9)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(ledger.open_positions().len(), 1);
        assert_eq!(ledger.open_for("BTCUSDT").unwrap().side, Side::Buy);
    }

    #[tokio::test]
    async fn failed_dispatch_leaves_no_partial_state() {
        // Router with no facets: every dispatch fails with SelectorNotFound.
        let router = Arc::new(ExecutionRouter::new());
        let hub = Arc::new(BroadcastHub::new(64, Duration::from_millis(100)));
        let mut rx = hub.subscribe();
        let ledger = PositionLedger::new(router, hub, 3, 0.02, 0.05);

        let err = ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Execution(RouterError::SelectorNotFound(_))
        ));
        assert!(ledger.open_positions().is_empty());
        // No trade event was published for the failed attempt.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_close_keeps_position_open() {
        let router = Arc::new(ExecutionRouter::with_default_facets());
        let hub = Arc::new(BroadcastHub::new(64, Duration::from_millis(100)));
        let ledger = PositionLedger::new(Arc::clone(&router), hub, 3, 0.02, 0.05);

        let position = ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap()
            .unwrap();

        // Break the close route, then try to close.
        router.cut("RiskFacet", &["closePosition"]);
        let err = ledger
            .close(&position, 95.0, CloseReason::StopLoss)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Execution(RouterError::HandlerMissing { .. })
        ));
        assert_eq!(ledger.open_positions().len(), 1);
        assert!(ledger.trade_history().is_empty());
    }

    #[tokio::test]
    async fn stop_loss_checked_before_take_profit() {
        let ledger = ledger();
        ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap();

        // Inside both thresholds: nothing fires.
        assert!(ledger.check_exits("BTCUSDT", 99.0).await.unwrap().is_none());

        let trade = ledger
            .check_exits("BTCUSDT", 97.9)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.close_reason, CloseReason::StopLoss);
        assert!(trade.pnl < 0.0);
    }

    #[tokio::test]
    async fn sell_side_exit_thresholds_are_mirrored() {
        let ledger = ledger();
        ledger
            .open("ETHUSDT", Side::Sell, 100.0, 0.1, 0.9)
            .await
            .unwrap();

        // Price falling 5% is take-profit for a short.
        let trade = ledger
            .check_exits("ETHUSDT", 95.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.close_reason, CloseReason::TakeProfit);
        assert!(trade.pnl > 0.0);
    }

    #[tokio::test]
    async fn history_is_capped_most_recent_first() {
        let ledger = ledger();
        for i in 0..5 {
            let instrument = format!("SYM{i}USDT");
            let position = ledger
                .open(&instrument, Side::Buy, 100.0, 0.1, 0.9)
                .await
                .unwrap()
                .unwrap();
            ledger
                .close(&position, 100.0 + i as f64, CloseReason::TakeProfit)
                .await
                .unwrap();
        }

        let history = ledger.trade_history();
        assert_eq!(history.len(), 3);
        // Most recent close (exit 104) is at the head; the two oldest were
        // evicted.
        assert_eq!(history[0].exit_price, 104.0);
        assert_eq!(history[2].exit_price, 102.0);
    }

    #[tokio::test]
    async fn stats_aggregate_wins_and_pnl() {
        let ledger = ledger();
        assert_eq!(ledger.stats().total_trades, 0);
        assert_eq!(ledger.stats().win_rate, 0.0);

        let p1 = ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap()
            .unwrap();
        ledger.close(&p1, 110.0, CloseReason::TakeProfit).await.unwrap();

        let p2 = ledger
            .open("ETHUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap()
            .unwrap();
        ledger.close(&p2, 95.0, CloseReason::StopLoss).await.unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.win_rate, 0.5);
        assert!((stats.total_pn_l - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn trade_events_publish_after_mutation() {
        let router = Arc::new(ExecutionRouter::with_default_facets());
        let hub = Arc::new(BroadcastHub::new(64, Duration::from_millis(100)));
        let mut rx = hub.subscribe();
        let ledger = PositionLedger::new(router, Arc::clone(&hub), 3, 0.02, 0.05);

        let position = ledger
            .open("BTCUSDT", Side::Buy, 100.0, 0.1, 0.9)
            .await
            .unwrap()
            .unwrap();
        // By the time the event is observable, the ledger already holds the
        // position.
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, PushEvent::TradeUpdate(_)));
        assert_eq!(ledger.open_positions().len(), 1);

        ledger
            .close(&position, 106.0, CloseReason::TakeProfit)
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, PushEvent::TradeUpdate(_)));
        assert!(ledger.open_positions().is_empty());
    }
}
