//! Order lifecycle use cases
//!
//! - [`money`]: Decimal pricing helpers
//! - [`OrderService`]: creation, status transitions, staff notes, reads

pub mod money;
mod service;

pub use service::OrderService;
