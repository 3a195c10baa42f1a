//! order-server: order lifecycle core of the QR ordering platform
//!
//! - Order creation with authoritative pricing from option deltas
//! - NEW → PREPARING → READY → SERVED state machine, CANCELLED side exit
//! - Per-venue live fan-out over WebSocket, best-effort staff push

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod live;
pub mod orders;
pub mod push;
pub mod state;
pub mod utils;

pub use config::Config;
pub use state::AppState;
