//! Data models
//!
//! Shared between order-server and the client runtime (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` snowflake ids, all timestamps are Unix millis.

pub mod menu;
pub mod order;
pub mod venue;

// Re-exports
pub use menu::*;
pub use order::*;
pub use venue::*;
