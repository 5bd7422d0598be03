//! # Error Types
//!
//! Domain-specific error types for dulce-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dulce-core errors (this file)                                         │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dulce-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures, lost optimistic races        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → UI handler              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only strict-fail operations (transfers, row issuance) produce these
//! errors. Allocation shortfalls and report aggregation never fail.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations. Every variant carries a user-facing message.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// Vendor order row cannot be found.
    #[error("Vendor row not found: {0}")]
    RowNotFound(String),

    /// Seller is not in the directory.
    #[error("Seller not found: {0}")]
    SellerNotFound(String),

    /// No rows exist under the given order key.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The origin row no longer holds enough packages.
    ///
    /// ## When This Occurs
    /// - A sale or another transfer consumed the stock between the moment the
    ///   transfer form was loaded and the moment it was submitted.
    #[error("Insufficient stock on row {row_id}: available {available} packages, requested {requested}")]
    InsufficientStock {
        row_id: String,
        available: i64,
        requested: i64,
    },

    /// Origin and destination rows hold different products.
    #[error("Product mismatch: origin holds {origin}, destination holds {destination}")]
    ProductMismatch { origin: String, destination: String },

    /// A transfer must explain why stock is moving.
    #[error("A comment justifying the transfer is required")]
    MissingComment,

    /// No destination row, order, or new order was selected.
    #[error("A transfer destination is required")]
    MissingDestination,

    /// The destination belongs to the origin seller.
    #[error("Destination seller {seller_id} is the origin seller; use a new order with a different date")]
    SameSeller { seller_id: String },

    /// Origin and destination are the same row.
    #[error("Cannot transfer row {0} onto itself")]
    SameRow(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Malformed input, caught before any ledger rule runs.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} cannot be blank")]
    Required { field: String },

    #[error("{field} is limited to {max} characters")]
    TooLong { field: String, max: usize },

    /// Package counts above the per-transfer ceiling, prices beyond the
    /// storable range.
    #[error("{field} must lie in {min}..={max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Dates are `YYYY-MM-DD`.
    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Branch names outside RIVAS, SAN_JORGE and ISLA.
    #[error("{field} must be one of {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
