//! Unified error types and result handling.
//!
//! Every core operation returns [`Result`]. Each variant maps to an HTTP status and an
//! RFC 7807 problem body so a controller layer can render failures without inspecting
//! messages.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced row does not exist or is soft-deleted
    #[error("{entity} not found: {id}")]
    EntityNotFound {
        /// Entity kind, e.g. `"Product"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A unique key is already taken
    #[error("{entity} already exists: {key}")]
    DuplicateEntity {
        /// Entity kind
        entity: &'static str,
        /// The conflicting key
        key: String,
    },

    /// The row exists but is in a state that does not allow the operation
    #[error("{entity} {id} is in an invalid state: {message}")]
    InvalidEntityState {
        /// Entity kind
        entity: &'static str,
        /// Row identifier
        id: String,
        /// What is wrong
        message: String,
    },

    /// A product cannot be sold because it is not in stock
    #[error("Product {product_id} is not available for sale")]
    InsufficientStock {
        /// The unavailable product
        product_id: i64,
    },

    /// The caller is not allowed to perform the action
    #[error("Insufficient permissions for {action}")]
    InsufficientPermissions {
        /// The attempted action
        action: String,
    },

    /// Payment is missing, short, or otherwise unacceptable
    #[error("Payment error: {message}")]
    Payment {
        /// What is wrong with the payment
        message: String,
    },

    /// A debit exceeds the available balance
    #[error("Insufficient funds: balance {current}, required {required}")]
    InsufficientFunds {
        /// Balance before the debit
        current: Decimal,
        /// Amount that was requested
        required: Decimal,
    },

    /// Input failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// What failed
        message: String,
    },

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What failed
        message: String,
    },

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::EntityNotFound`]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::EntityNotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Validation`]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::InvalidEntityState`]
    pub fn invalid_state(entity: &'static str, id: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidEntityState {
            entity,
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Payment`]
    pub fn payment(message: impl Into<String>) -> Self {
        Self::Payment {
            message: message.into(),
        }
    }

    /// HTTP status code for this error
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::EntityNotFound { .. } => 404,
            Self::DuplicateEntity { .. }
            | Self::InvalidEntityState { .. }
            | Self::InsufficientStock { .. }
            | Self::InsufficientFunds { .. } => 409,
            Self::InsufficientPermissions { .. } => 403,
            Self::Payment { .. } => 402,
            Self::Validation { .. } => 400,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => 500,
        }
    }

    /// Message safe to show to an end user. Internal failures are not echoed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Converts the error into an RFC 7807 problem body
    #[must_use]
    pub fn to_problem_details(&self) -> ProblemDetails {
        let slug = self.problem_slug();
        ProblemDetails {
            r#type: format!("/problems/{slug}"),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.user_message(),
            instance: None,
        }
    }

    const fn problem_slug(&self) -> &'static str {
        match self {
            Self::EntityNotFound { .. } => "entity-not-found",
            Self::DuplicateEntity { .. } => "duplicate-entity",
            Self::InvalidEntityState { .. } => "invalid-entity-state",
            Self::InsufficientStock { .. } => "insufficient-stock",
            Self::InsufficientPermissions { .. } => "insufficient-permissions",
            Self::Payment { .. } => "payment",
            Self::InsufficientFunds { .. } => "insufficient-funds",
            Self::Validation { .. } => "validation",
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => "internal",
        }
    }

    const fn problem_title(&self) -> &'static str {
        match self {
            Self::EntityNotFound { .. } => "Resource Not Found",
            Self::DuplicateEntity { .. } => "Duplicate Resource",
            Self::InvalidEntityState { .. } => "Invalid State",
            Self::InsufficientStock { .. } => "Insufficient Stock",
            Self::InsufficientPermissions { .. } => "Forbidden",
            Self::Payment { .. } => "Payment Error",
            Self::InsufficientFunds { .. } => "Insufficient Funds",
            Self::Validation { .. } => "Validation Error",
            Self::Config { .. } | Self::Database(_) | Self::Io(_) => "Internal Server Error",
        }
    }
}

/// RFC 7807 problem details body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// Problem type reference
    pub r#type: String,
    /// Short summary
    pub title: String,
    /// HTTP status code
    pub status: u16,
    /// Human-readable explanation
    pub detail: String,
    /// Request-specific reference, filled in by the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::not_found("Product", 7).status_code(), 404);
        assert_eq!(Error::validation("bad").status_code(), 400);
        assert_eq!(Error::payment("short").status_code(), 402);
        assert_eq!(Error::InsufficientStock { product_id: 1 }.status_code(), 409);
        assert_eq!(
            Error::InsufficientPermissions {
                action: "void".to_string()
            }
            .status_code(),
            403
        );
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).status_code(),
            500
        );
    }

    #[test]
    fn test_problem_details_for_not_found() {
        let problem = Error::not_found("Order", 42).to_problem_details();
        assert_eq!(problem.status, 404);
        assert_eq!(problem.title, "Resource Not Found");
        assert_eq!(problem.r#type, "/problems/entity-not-found");
        assert_eq!(problem.detail, "Order not found: 42");
        assert!(problem.instance.is_none());
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let problem = Error::Database(sea_orm::DbErr::Custom("secret".to_string()))
            .to_problem_details();
        assert_eq!(problem.status, 500);
        assert_eq!(problem.detail, "An internal error occurred");
    }
}
