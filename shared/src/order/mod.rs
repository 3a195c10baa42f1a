//! Order lifecycle types
//!
//! - [`OrderStatus`]: the kitchen state machine
//! - [`OptionSelection`]: normalized option choices of an order line
//! - [`dto`]: request/response contracts of the order endpoints

pub mod dto;
pub mod options;
pub mod status;

// Re-exports
pub use dto::*;
pub use options::{OptionSelection, SelectedOption, SelectedValue};
pub use status::OrderStatus;
