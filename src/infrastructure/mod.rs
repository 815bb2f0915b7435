pub mod broadcast;
pub mod config;
pub mod feed;
pub mod router;

pub use broadcast::BroadcastHub;
pub use config::{ConfigError, EngineConfig};
pub use feed::{FeedIngestor, PriceTable};
pub use router::{
    ExecutionReceipt, ExecutionRouter, Facet, RiskFacet, RouterError, TradingFacet,
    ZkVerifierFacet,
};
