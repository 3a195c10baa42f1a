//! Error types and API response structures

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// The single error type that crosses the HTTP boundary. NotFound and
/// Validation failures carry a message naming the offending venue, item,
/// option or order so the ordering UI can show it inline.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn is_not_found(&self) -> bool {
        self.code.is_not_found()
    }

    pub fn is_validation(&self) -> bool {
        self.code.is_validation()
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a generic not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    pub fn venue_not_found(venue_id: i64) -> Self {
        Self::with_message(ErrorCode::VenueNotFound, "Venue not found")
            .with_detail("resource", "Venue")
            .with_detail("venue_id", venue_id)
    }

    pub fn table_not_found(table_id: i64) -> Self {
        Self::with_message(ErrorCode::TableNotFound, "Table not found")
            .with_detail("resource", "Table")
            .with_detail("table_id", table_id)
    }

    pub fn menu_item_not_found(item_id: i64) -> Self {
        Self::with_message(
            ErrorCode::MenuItemNotFound,
            format!("Menu item {} not found", item_id),
        )
        .with_detail("resource", "MenuItem")
        .with_detail("item_id", item_id)
    }

    pub fn order_not_found(order_id: i64) -> Self {
        Self::with_message(ErrorCode::OrderNotFound, "Order not found")
            .with_detail("resource", "Order")
            .with_detail("order_id", order_id)
    }

    /// The menu item exists but is switched off
    pub fn item_unavailable(item_id: i64, item_name: &str) -> Self {
        Self::with_message(
            ErrorCode::MenuItemUnavailable,
            format!("{} is currently unavailable", item_name),
        )
        .with_detail("item_id", item_id)
    }

    /// A required option of an item has no selected value
    pub fn required_option_missing(option_name: &str, item_name: &str) -> Self {
        Self::with_message(
            ErrorCode::RequiredOptionMissing,
            format!("Option \"{}\" is required for {}", option_name, item_name),
        )
        .with_detail("option", option_name)
        .with_detail("item", item_name)
    }

    pub fn invalid_option_payload(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidOptionPayload, msg)
    }

    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        let (from, to) = (from.to_string(), to.to_string());
        Self::with_message(
            ErrorCode::InvalidStatusTransition,
            format!("Cannot move order from {} to {}", from, to),
        )
        .with_detail("from", from)
        .with_detail("to", to)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::DatabaseError, msg)
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }
}

/// Unified API response structure
///
/// - `code`: Error code (0 for success)
/// - `message`: Human-readable message
/// - `data`: Response payload (on success)
/// - `details`: Additional error details (on failure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Error code (0 for success, non-zero for errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Additional error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }

    /// Turn an error envelope back into an [`AppError`] (client side)
    pub fn into_error(self) -> Option<AppError> {
        let code = ErrorCode::try_from(self.code?).unwrap_or(ErrorCode::Unknown);
        if code.is_success() {
            return None;
        }
        Some(AppError {
            code,
            message: self.message,
            details: self.details,
        })
    }
}

impl ApiResponse<()> {
    /// Create a success response without data
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            message: "OK".to_string(),
            data: None,
            details: None,
        }
    }

    /// Create an error response from an AppError
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;

        let status = self.http_status();
        let body = ApiResponse::<()>::error(&self);

        if matches!(self.code.category(), super::category::ErrorCategory::System) {
            tracing::error!(
                code = %self.code,
                message = %self.message,
                "System error occurred"
            );
        }

        (status, Json(body)).into_response()
    }
}
