//! # Repository Module
//!
//! One repository per table.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.vendor_rows()   VendorRowRepository       vendor_order_rows        │
//! │  db.transfers()     TransferRecordRepository  transfer_records         │
//! │  db.sellers()       SellerRepository          sellers                  │
//! │  db.catalog()       CatalogRepository         price_catalog            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hold a pool and run single statements. Operations spanning
//! several rows go through [`crate::Ledger`], which calls the `*_in`
//! associated functions on one transaction.

pub mod catalog;
pub mod seller;
pub mod transfer;
pub mod vendor_row;
