//! # POS Error Types
//!
//! Typed error handling for the checkout engine.
//! All session, cart and payment operations return `Result<T, PosError>`.

use crate::discount_code::DiscountCodeRejection;
use crate::payment::PaymentValidationError;
use thiserror::Error;

/// Core error type for all checkout operations
#[derive(Debug, Error)]
pub enum PosError {
    /// Resolved inventory is zero or below
    #[error("{name} is out of stock")]
    OutOfStock { name: String },

    /// Requested quantity exceeds the cached inventory ceiling
    #[error("Only {available} of {name} in stock")]
    InsufficientStock { name: String, available: u32 },

    /// Product carries no sellable variant
    #[error("Product has no variants: {product_id}")]
    NoVariants { product_id: String },

    /// Requested variant does not belong to the product
    #[error("Variant {variant_id} not found on product {product_id}")]
    VariantNotFound {
        product_id: String,
        variant_id: String,
    },

    /// Cart line not found
    #[error("Cart item not found: {0}")]
    CartItemNotFound(String),

    /// Payment entry not found
    #[error("Payment method not found: {0}")]
    PaymentMethodNotFound(String),

    /// Payment method add/remove refused
    #[error("{0}")]
    PaymentMethodRejected(String),

    /// Manual discount out of range
    #[error("Invalid discount: {0}")]
    InvalidDiscount(String),

    /// Invalid operator input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Discount code was refused
    #[error("Discount code rejected: {0}")]
    DiscountCodeRejected(#[from] DiscountCodeRejection),

    /// Tendered payments do not satisfy the order
    #[error("Payment invalid: {0}")]
    PaymentInvalid(#[from] PaymentValidationError),

    /// Submission attempted with nothing in the cart
    #[error("Cart is empty")]
    EmptyCart,

    /// An order request is in flight
    #[error("An order is already being processed")]
    SubmissionInProgress,

    /// Response belongs to a cart state that no longer exists
    #[error("Stale response discarded (request generation {request}, current {current})")]
    StaleResponse { request: u64, current: u64 },

    /// Catalog/order service reported an error
    #[error("Service error [{service}]: {message}")]
    ServiceError { service: String, message: String },

    /// Network/HTTP error communicating with the service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Configuration errors (missing URL, unreadable catalog)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Operator-facing error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Stock ceilings; nothing was mutated
    Inventory,
    /// Input or payment problems the operator can correct
    Validation,
    /// Discount code refused
    DiscountCode,
    /// Search, validation or submission request failed
    Service,
}

impl PosError {
    /// Returns the class this error is reported under
    pub fn category(&self) -> ErrorCategory {
        match self {
            PosError::OutOfStock { .. } | PosError::InsufficientStock { .. } => {
                ErrorCategory::Inventory
            }
            PosError::DiscountCodeRejected(_) => ErrorCategory::DiscountCode,
            PosError::StaleResponse { .. }
            | PosError::ServiceError { .. }
            | PosError::NetworkError(_)
            | PosError::Configuration(_)
            | PosError::Serialization(_)
            | PosError::Internal(_) => ErrorCategory::Service,
            _ => ErrorCategory::Validation,
        }
    }

    /// Returns true if the operator can simply retry the same action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PosError::NetworkError(_) | PosError::ServiceError { .. }
        )
    }
}

impl From<serde_json::Error> for PosError {
    fn from(err: serde_json::Error) -> Self {
        PosError::Serialization(err.to_string())
    }
}

/// Result type alias for checkout operations
pub type PosResult<T> = Result<T, PosError>;
