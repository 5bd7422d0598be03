//! # dulce-core: Pure Ledger Rules for Dulce Vendor Inventory
//!
//! Everything that decides *what* happens to the vendor ledger lives here,
//! as pure functions over plain data. Reading and writing rows is the job of
//! `dulce-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dulce Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              UI handlers / reports (out of tree)                │   │
//! │  │    sell ──► transfer form ──► order report                      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               dulce-db  (Ledger, repositories)                  │   │
//! │  │    read rows ──► plan (below) ──► versioned write, one tx       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dulce-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐               │   │
//! │  │   │ allocation │  │  transfer  │  │  finance   │               │   │
//! │  │   │ FIFO plan  │  │ validate + │  │ row/order  │               │   │
//! │  │   │            │  │ plan legs  │  │ figures    │               │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘               │   │
//! │  │   types · money · validation · legacy · error                   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger rows, transfer records, sellers, catalog entries
//! - [`money`] - Integer-cent money
//! - [`allocation`] - FIFO sale allocation
//! - [`transfer`] - Package transfer validation and planning
//! - [`finance`] - Derived per-row and per-order figures
//! - [`legacy`] - Lenient decoding of document-store exports
//! - [`validation`] - Input checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use dulce_core::money::Money;
//! use dulce_core::types::CommissionRate;
//!
//! let gross_profit = Money::from_cents(8_000);
//! let commission = gross_profit.percentage(CommissionRate::from_percentage(10.0));
//!
//! assert_eq!(commission.cents(), 800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod error;
pub mod finance;
pub mod legacy;
pub mod money;
pub mod transfer;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use allocation::{plan_allocation, AllocationPlan};
pub use error::{CoreError, CoreResult, ValidationError};
pub use finance::{OrderSummary, PriceCatalog, RowFinancials};
pub use money::Money;
pub use transfer::{TransferDestination, TransferPlan, TransferPolicy, TransferRequest};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Joins seller id and batch date into an order key (`S1__2024-01-05`).
pub const ORDER_KEY_SEPARATOR: &str = "__";

/// Longest accepted transfer comment, in characters.
pub const MAX_COMMENT_LEN: usize = 500;
