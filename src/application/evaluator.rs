//! Signal evaluator
//!
//! One periodic scheduler drives evaluation across all instruments. Each
//! tick reads a consistent snapshot of the price table, then per instrument:
//! feeds the price into the indicator windows, scores confidence, checks
//! exits before entries, handles opposite-signal reversals, and publishes a
//! status event whether or not anything traded.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{IndicatorEngine, PushEvent, Side, Signal, SignalAction, SystemStatus};
use crate::infrastructure::{BroadcastHub, EngineConfig, PriceTable};

use super::ledger::PositionLedger;

/// Heuristic confidence score in [0, 0.99].
///
/// Base 0.5; +0.3 for an extreme oscillator (<20 or >80), else +0.1 for a
/// moderate one (<30 or >70); +0.1 when price deviates more than 1% from the
/// moving average. The exact thresholds and additive weights are load-bearing
/// for behavior compatibility; do not tune them.
pub fn confidence_score(oscillator: f64, price: f64, moving_average: f64) -> f64 {
    let mut confidence: f64 = 0.5;

    if oscillator < 20.0 || oscillator > 80.0 {
        confidence += 0.3;
    } else if oscillator < 30.0 || oscillator > 70.0 {
        confidence += 0.1;
    }

    let deviation = ((price - moving_average) / moving_average).abs();
    if deviation > 0.01 {
        confidence += 0.1;
    }

    confidence.min(0.99)
}

pub struct SignalEvaluator {
    table: Arc<PriceTable>,
    indicators: Arc<IndicatorEngine>,
    ledger: Arc<PositionLedger>,
    hub: Arc<BroadcastHub>,
    instruments: Vec<String>,
    buy_threshold: f64,
    sell_threshold: f64,
    trade_size: f64,
    interval: Duration,
}

impl SignalEvaluator {
    pub fn new(
        config: &EngineConfig,
        table: Arc<PriceTable>,
        indicators: Arc<IndicatorEngine>,
        ledger: Arc<PositionLedger>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        SignalEvaluator {
            table,
            indicators,
            ledger,
            hub,
            instruments: config.instruments.clone(),
            buy_threshold: config.buy_threshold,
            sell_threshold: config.sell_threshold,
            trade_size: config.trade_size,
            interval: Duration::from_millis(config.eval_interval_ms),
        }
    }

    /// Scheduler loop: one timer for all instruments so every evaluation in
    /// a tick reads the same table snapshot.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.evaluate_tick().await;
        }
    }

    /// Evaluate every configured instrument against a single consistent
    /// snapshot of the price table.
    pub async fn evaluate_tick(&self) {
        let snapshot = self.table.snapshot();
        for instrument in &self.instruments {
            let Some(quote) = snapshot.get(instrument) else {
                continue; // no data yet
            };
            if quote.price <= 0.0 {
                continue;
            }
            self.evaluate_instrument(instrument, quote.price).await;
        }
    }

    /// One instrument, one tick.
    pub async fn evaluate_instrument(&self, instrument: &str, price: f64) {
        self.indicators.observe(instrument, price);
        let snapshot = self.indicators.compute(instrument);
        let (Some(oscillator), Some(moving_average)) =
            (snapshot.oscillator, snapshot.moving_average)
        else {
            return; // window still warming up
        };

        let confidence = confidence_score(oscillator, price, moving_average);

        // Exits run unconditionally before any entry decision.
        if let Err(e) = self.ledger.check_exits(instrument, price).await {
            tracing::error!(instrument, error = %e, "exit evaluation failed");
        }

        let signal = Signal {
            instrument: instrument.to_string(),
            action: self.decide(oscillator, confidence),
            confidence,
        };
        self.act_on(&signal, price).await;

        self.hub.publish(PushEvent::SystemStatus(SystemStatus {
            instrument: instrument.to_string(),
            oscillator,
            confidence,
        }));
    }

    fn decide(&self, oscillator: f64, confidence: f64) -> SignalAction {
        if confidence > 0.8 && oscillator < self.buy_threshold {
            SignalAction::OpenBuy
        } else if confidence > 0.8 && oscillator > self.sell_threshold {
            SignalAction::OpenSell
        } else {
            SignalAction::None
        }
    }

    async fn act_on(&self, signal: &Signal, price: f64) {
        let side = match signal.action {
            SignalAction::OpenBuy => Side::Buy,
            SignalAction::OpenSell => Side::Sell,
            SignalAction::None => return,
        };

        // An opposite-side position turns the entry into a reversal close;
        // no new position opens in the same tick.
        if let Some(existing) = self.ledger.open_for(&signal.instrument) {
            if existing.side == side.opposite() {
                if let Err(e) = self
                    .ledger
                    .close(&existing, price, crate::domain::CloseReason::SignalFlip)
                    .await
                {
                    tracing::error!(instrument = %signal.instrument, error = %e, "reversal close failed");
                }
            }
            return;
        }

        match self
            .ledger
            .open(&signal.instrument, side, price, self.trade_size, signal.confidence)
            .await
        {
            Ok(Some(position)) => {
                tracing::info!(
                    instrument = %signal.instrument,
                    ?side,
                    confidence = signal.confidence,
                    id = %position.id,
                    "entry executed"
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(instrument = %signal.instrument, error = %e, "entry dispatch failed");
            }
        }
    }
}
