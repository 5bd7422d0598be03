//! # dulce-db: Persistence Layer for the Dulce Ledger
//!
//! Stores vendor order rows, transfer records, the seller directory and the
//! price catalog in SQLite (via sqlx), and runs the ledger operations of
//! `dulce-core` as optimistic transactions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dulce Ledger Data Flow                           │
//! │                                                                         │
//! │  Caller (sale handler, transfer form, report)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     dulce-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │    Ledger     │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger.rs)  │───►│ VendorRowRepo │    │  (embedded)  │  │   │
//! │  │   │ allocate_sale │    │ TransferRepo  │    │ 001_initial  │  │   │
//! │  │   │ transfer_pkgs │    │ SellerRepo    │    │              │  │   │
//! │  │   │ reports       │    │ CatalogRepo   │    │              │  │   │
//! │  │   └───────┬───────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │           │  plans from        │                               │   │
//! │  │           ▼  dulce-core        ▼                               │   │
//! │  │   Database (pool.rs) ── SqlitePool, LedgerConfig (config.rs)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - `DULCE_*` environment configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table
//! - [`ledger`] - Sale allocation, transfers, issuance and reports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dulce_db::{Database, LedgerConfig};
//!
//! let config = LedgerConfig::load()?;
//! let db = Database::new(config.db_config()).await?;
//! let ledger = dulce_db::Ledger::from_config(db.clone(), &config);
//!
//! let allocation = ledger.allocate_sale("S1", "P1", 70).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use error::{DbError, DbResult};
pub use ledger::{Ledger, RetryPolicy};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::seller::SellerRepository;
pub use repository::transfer::TransferRecordRepository;
pub use repository::vendor_row::VendorRowRepository;
