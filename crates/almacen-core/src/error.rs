//! # Error Types
//!
//! Domain-specific error types for almacen-core.
//!
//! ## Error Flow
//! ```text
//! ValidationError → CoreError → DbError (almacen-db) → SyncError (almacen-sync)
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, never manual impls
//! 2. Context in messages (product id, quantities)
//! 3. Errors are enum variants, never bare Strings

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product referenced by a draft line does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Not enough stock to cover a requested decrement.
    ///
    /// Expected, user-facing failure: the UI shows it and lets the cashier
    /// adjust quantities. Never a bug.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock { product_id: i64, requested: i64 },

    /// A stored tag could not be parsed back into its enum.
    #[error("Unknown {kind}: '{value}'")]
    UnknownTag { kind: &'static str, value: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation failures, raised before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Draft has no line items.
    #[error("Invoice draft has no items")]
    EmptyDraft,

    /// Draft has more items than allowed.
    #[error("Invoice draft cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// Line quantity must be strictly positive.
    #[error("Quantity for product {product_id} must be positive, got {quantity}")]
    NonPositiveQuantity { product_id: i64, quantity: i64 },

    /// Line quantity exceeds the sane upper bound.
    #[error("Quantity {quantity} for product {product_id} exceeds maximum {max}")]
    QuantityTooLarge {
        product_id: i64,
        quantity: i64,
        max: i64,
    },

    /// Unit price cannot be negative.
    #[error("Unit price for product {product_id} cannot be negative")]
    NegativeUnitPrice { product_id: i64 },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
