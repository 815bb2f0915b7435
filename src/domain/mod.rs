pub mod events;
pub mod indicators;
pub mod model;

pub use events::{PushEvent, SystemStatus, TradeLifecycle, TradeUpdate};
pub use indicators::{IndicatorEngine, PriceWindow, rsi, sma};
pub use model::{
    CloseReason, ClosedTrade, IndicatorSnapshot, LedgerStats, Position, PriceTick, Quote, Side,
    Signal, SignalAction,
};
