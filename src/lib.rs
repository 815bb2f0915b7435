//! Simulated automated-trading backend
//!
//! Ingests a live price feed, computes windowed indicators, derives
//! entry/exit signals with a confidence score, routes execution through a
//! diamond-style selector dispatcher, keeps the position/trade ledger and
//! streams state changes to subscribed clients.
//!
//! # Architecture
//!
//! - **Domain**: types, push-event envelopes, indicator math
//! - **Application**: signal evaluator and position ledger
//! - **Infrastructure**: feed ingestor, broadcast hub, execution router, config
//! - **Presentation**: REST query surface and WebSocket push channel
//!
//! All mutable state is owned by [`TradingSystem`], constructed once at
//! startup and shared by handle; nothing is ambient.
//!
//! # Example
//!
//! ```ignore
//! use stylus_trader_sim::{EngineConfig, TradingSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = TradingSystem::new(EngineConfig::default())?;
//!     system.run().await
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::{PositionLedger, SignalEvaluator, confidence_score};
pub use domain::{
    CloseReason, ClosedTrade, IndicatorEngine, LedgerStats, Position, PriceTick, PushEvent, Quote,
    Side, Signal, SignalAction, SystemStatus, TradeLifecycle, TradeUpdate,
};
pub use infrastructure::{
    BroadcastHub, ConfigError, EngineConfig, ExecutionReceipt, ExecutionRouter, Facet,
    FeedIngestor, PriceTable, RouterError,
};
pub use presentation::{AppState, create_router};

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Process-scoped context object owning every component of the pipeline.
pub struct TradingSystem {
    pub config: EngineConfig,
    pub table: Arc<PriceTable>,
    pub hub: Arc<BroadcastHub>,
    pub router: Arc<ExecutionRouter>,
    pub ledger: Arc<PositionLedger>,
    pub evaluator: Arc<SignalEvaluator>,
    ingestor: FeedIngestor,
}

impl std::fmt::Debug for TradingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingSystem").finish_non_exhaustive()
    }
}

impl TradingSystem {
    /// Wire up the full pipeline. Fails if the configuration is unusable,
    /// the only fatal condition in this subsystem.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let router = Arc::new(ExecutionRouter::with_default_facets());
        Self::with_router(config, router)
    }

    /// Wire up the pipeline around a caller-supplied execution router.
    pub fn with_router(
        config: EngineConfig,
        router: Arc<ExecutionRouter>,
    ) -> Result<Self, ConfigError> {
        if router.route_count() == 0 {
            return Err(ConfigError::Invalid("no facets registered".into()));
        }

        let table = Arc::new(PriceTable::new());
        let hub = Arc::new(BroadcastHub::new(
            config.event_capacity,
            Duration::from_millis(config.broadcast_throttle_ms),
        ));
        let indicators = Arc::new(IndicatorEngine::new(
            config.window_size,
            config.oscillator_period,
            config.moving_average_period,
        ));
        let ledger = Arc::new(PositionLedger::new(
            Arc::clone(&router),
            Arc::clone(&hub),
            config.history_cap,
            config.stop_loss_pct,
            config.take_profit_pct,
        ));
        let evaluator = Arc::new(SignalEvaluator::new(
            &config,
            Arc::clone(&table),
            indicators,
            Arc::clone(&ledger),
            Arc::clone(&hub),
        ));
        let ingestor = FeedIngestor::new(
            &config.feed_url,
            &config.instruments,
            Arc::clone(&table),
            Arc::clone(&hub),
            Duration::from_millis(config.reconnect_delay_ms),
        );

        Ok(TradingSystem {
            config,
            table,
            hub,
            router,
            ledger,
            evaluator,
            ingestor,
        })
    }

    /// Run until ctrl-c: feed task, evaluation scheduler, HTTP/WS server.
    /// In-flight dispatches finish naturally; only the long-lived loops are
    /// torn down once the server drains.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let state = Arc::new(AppState {
            ledger: Arc::clone(&self.ledger),
            table: Arc::clone(&self.table),
            hub: Arc::clone(&self.hub),
        });
        let app = create_router(state);

        tracing::info!(url = %self.ingestor.stream_url(), "starting feed ingestor");
        let feed_task = tokio::spawn(self.ingestor.run());

        tracing::info!(
            interval_ms = self.config.eval_interval_ms,
            instruments = ?self.config.instruments,
            "starting evaluation scheduler"
        );
        let scheduler_task = tokio::spawn(Arc::clone(&self.evaluator).run());

        tracing::info!("listening on {}", addr);
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await?;

        feed_task.abort();
        scheduler_task.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_wires_default_facets() {
        let system = TradingSystem::new(EngineConfig::default()).unwrap();
        assert_eq!(system.router.facet_count(), 3);
        assert!(system.router.route_count() > 0);
        assert!(system.ledger.open_positions().is_empty());
    }

    #[test]
    fn empty_router_is_fatal_at_startup() {
        let err =
            TradingSystem::with_router(EngineConfig::default(), Arc::new(ExecutionRouter::new()))
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
