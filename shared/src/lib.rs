//! Shared types for the QR ordering platform
//!
//! Types used by both `order-server` and `order-client`: the error system,
//! data models, the order status state machine, option-selection
//! normalization and the live broadcast protocol.

pub mod error;
pub mod live;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use live::{ClientCommand, ControlMessage, LiveEvent, LiveEventKind, OrderSignal, ServerMessage};
pub use order::{OptionSelection, OrderStatus, SelectedOption, SelectedValue};
