//! Response envelope for callers that expose core operations over a wire.
//!
//! Every response has the same `{success, message, data}` shape. Failed responses
//! carry the error's user-facing message and no data.

use crate::errors::{Error, ProblemDetails};
use serde::{Deserialize, Serialize};

/// Uniform response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Short human-readable message
    pub message: String,
    /// Payload on success
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload
    pub fn ok(data: T) -> Self {
        Self::ok_with_message(data, "OK")
    }

    /// Successful response with a payload and a custom message
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failed response built from an error
    #[must_use]
    pub fn error(error: &Error) -> Self {
        Self {
            success: false,
            message: error.user_message(),
            data: None,
        }
    }
}

impl<T> From<crate::errors::Result<T>> for ApiResponse<T> {
    fn from(result: crate::errors::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::error(&e),
        }
    }
}

/// HTTP status and problem body for a failed operation
#[must_use]
pub fn problem_for(error: &Error) -> (u16, ProblemDetails) {
    (error.status_code(), error.to_problem_details())
}
