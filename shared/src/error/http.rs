//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            c if c.is_not_found() => StatusCode::NOT_FOUND,

            Self::TooManyConnections => StatusCode::TOO_MANY_REQUESTS,

            // Transient, client can retry
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,

            // Validation and business rule errors
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
