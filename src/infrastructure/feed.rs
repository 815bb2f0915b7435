//! Upstream price feed
//!
//! Maintains one multiplexed trade-stream connection for the configured
//! instrument set, normalizes inbound ticks into the shared price table and
//! triggers the throttled market broadcast. On disconnect it retries after a
//! fixed backoff, forever. Malformed payloads are logged and dropped.

use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::broadcast::BroadcastHub;
use crate::domain::{PriceTick, Quote};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Latest-price table. Writer: the feed ingestor. Readers take whole-table
/// snapshots so no evaluation ever observes a half-updated entry.
pub struct PriceTable {
    inner: RwLock<HashMap<String, Quote>>,
}

impl PriceTable {
    pub fn new() -> Self {
        PriceTable {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn update(&self, tick: &PriceTick) {
        self.inner.write().insert(
            tick.instrument.clone(),
            Quote {
                price: tick.price,
                time: tick.time,
            },
        );
    }

    pub fn get(&self, instrument: &str) -> Option<Quote> {
        self.inner.read().get(instrument).copied()
    }

    /// Consistent snapshot of the whole table.
    pub fn snapshot(&self) -> HashMap<String, Quote> {
        self.inner.read().clone()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw trade-stream payload: symbol, price as numeric string, event time.
#[derive(Debug, Deserialize)]
struct TradeStreamPayload {
    s: String,
    p: String,
    #[serde(rename = "T")]
    time: i64,
}

/// Parse and validate one inbound message. Unknown instruments and
/// non-positive prices are discarded (`None`), never an error.
pub fn parse_tick(text: &str, instruments: &HashSet<String>) -> Option<PriceTick> {
    let payload: TradeStreamPayload = match serde_json::from_str(text) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed feed payload");
            return None;
        }
    };

    let instrument = payload.s.to_uppercase();
    if !instruments.contains(&instrument) {
        return None;
    }

    let price: f64 = payload.p.parse().ok()?;
    if price <= 0.0 {
        return None;
    }

    Some(PriceTick {
        instrument,
        price,
        time: payload.time,
    })
}

/// Long-lived feed connection task.
pub struct FeedIngestor {
    url: String,
    instruments: HashSet<String>,
    table: Arc<PriceTable>,
    hub: Arc<BroadcastHub>,
    reconnect_delay: Duration,
}

impl FeedIngestor {
    pub fn new(
        feed_url: &str,
        instruments: &[String],
        table: Arc<PriceTable>,
        hub: Arc<BroadcastHub>,
        reconnect_delay: Duration,
    ) -> Self {
        let streams = instruments
            .iter()
            .map(|sym| format!("{}@trade", sym.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");

        FeedIngestor {
            url: format!("{}/{}", feed_url.trim_end_matches('/'), streams),
            instruments: instruments.iter().map(|s| s.to_uppercase()).collect(),
            table,
            hub,
            reconnect_delay,
        }
    }

    pub fn stream_url(&self) -> &str {
        &self.url
    }

    /// Connect-read-reconnect loop. Runs until the task is dropped at
    /// shutdown; upstream failures are never fatal.
    pub async fn run(self) {
        loop {
            match self.connect_and_stream().await {
                Ok(()) => tracing::warn!(url = %self.url, "feed connection closed"),
                Err(e) => tracing::warn!(url = %self.url, error = %e, "feed connection failed"),
            }
            tracing::info!(delay_ms = self.reconnect_delay.as_millis() as u64, "reconnecting feed");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn connect_and_stream(&self) -> Result<(), FeedError> {
        let (ws_stream, _) = connect_async(&self.url).await?;
        tracing::info!(url = %self.url, "connected to upstream feed");
        let (_write, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(tick) = parse_tick(&text, &self.instruments) {
                        self.table.update(&tick);
                        self.hub.publish_market(self.table.snapshot());
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(data)) => {
                    tracing::trace!(?data, "feed ping");
                }
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
