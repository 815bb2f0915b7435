//! Read-only query surface
//!
//! Pull-based and stateless: reflects ledger state as of the last successful
//! mutation. The dashboard polls these alongside the push channel.

use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::PositionLedger;
use crate::domain::{ClosedTrade, LedgerStats, Position};
use crate::infrastructure::{BroadcastHub, PriceTable};

use super::ws;

/// Shared state for REST handlers and the WebSocket upgrade.
pub struct AppState {
    pub ledger: Arc<PositionLedger>,
    pub table: Arc<PriceTable>,
    pub hub: Arc<BroadcastHub>,
}

/// GET /api/trades
pub async fn trades(State(state): State<Arc<AppState>>) -> Json<Vec<ClosedTrade>> {
    Json(state.ledger.trade_history())
}

/// GET /api/positions
pub async fn positions(State(state): State<Arc<AppState>>) -> Json<Vec<Position>> {
    Json(state.ledger.open_positions())
}

/// GET /api/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<LedgerStats> {
    Json(state.ledger.stats())
}

/// Build the full HTTP surface: query routes plus the push-channel upgrade.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/trades", get(trades))
        .route("/api/positions", get(positions))
        .route("/api/stats", get(stats))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
