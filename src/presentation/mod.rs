pub mod rest;
pub mod ws;

pub use rest::{AppState, create_router};
pub use ws::ws_handler;
