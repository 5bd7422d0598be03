//! # Domain Types
//!
//! Core domain types of the vendor-inventory ledger.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ VendorOrderRow  │   │ TransferRecord  │   │ SaleAllocation  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  order_key      │   │  from_* / to_*  │   │  entries        │       │
//! │  │  packages       │   │  packages_moved │   │  (row, units)   │       │
//! │  │  remaining_*    │   │  comment        │   │  shortfall      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Branch      │   │     Seller      │   │  CatalogEntry   │       │
//! │  │  RIVAS          │   │  branch         │   │  branch prices  │       │
//! │  │  SAN_JORGE      │   │  commission %   │   │  order time     │       │
//! │  │  ISLA           │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Package / Unit Duality
//! A row counts stock twice: in packages and in atomic units. Rows migrated
//! from the old document store may carry only one of the two remaining
//! counters, so readers always go through [`VendorOrderRow::available_units`]
//! and [`VendorOrderRow::available_packages`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::ORDER_KEY_SEPARATOR;

// =============================================================================
// Commission Rate
// =============================================================================

/// Vendor commission represented in basis points (1000 bps = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        CommissionRate(bps)
    }

    /// Creates a rate from a percentage as stored in the seller directory.
    ///
    /// Negative and non-finite percentages clamp to zero.
    ///
    /// ```rust
    /// use dulce_core::types::CommissionRate;
    ///
    /// assert_eq!(CommissionRate::from_percentage(12.5).bps(), 1250);
    /// assert_eq!(CommissionRate::from_percentage(-3.0).bps(), 0);
    /// ```
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return CommissionRate(0);
        }
        CommissionRate((pct * 100.0).round().min(u32::MAX as f64) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        CommissionRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        CommissionRate::zero()
    }
}

// =============================================================================
// Branch
// =============================================================================

/// A sales location with its own price list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Branch {
    Rivas,
    SanJorge,
    Isla,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Rivas, Branch::SanJorge, Branch::Isla];

    /// The stored/serialized name of the branch.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Branch::Rivas => "RIVAS",
            Branch::SanJorge => "SAN_JORGE",
            Branch::Isla => "ISLA",
        }
    }
}

impl Default for Branch {
    fn default() -> Self {
        Branch::Rivas
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parse: accepts `SAN_JORGE`, `San Jorge`, `san-jorge`, etc.
impl FromStr for Branch {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        match normalized.as_str() {
            "RIVAS" => Ok(Branch::Rivas),
            "SAN_JORGE" | "SANJORGE" => Ok(Branch::SanJorge),
            "ISLA" => Ok(Branch::Isla),
            _ => Err(ValidationError::NotAllowed {
                field: "branch".to_string(),
                allowed: Branch::ALL.iter().map(|b| b.as_str().to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Order Key
// =============================================================================

/// Builds the key grouping rows issued together for one (seller, date) batch.
///
/// Falls back to the raw upstream order id when either part is unknown, and
/// to an empty string when nothing is known at all.
///
/// ```rust
/// use chrono::NaiveDate;
/// use dulce_core::types::order_key;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 5);
/// assert_eq!(order_key("S1", date, Some("ord-9")), "S1__2024-01-05");
/// assert_eq!(order_key("", date, Some("ord-9")), "ord-9");
/// assert_eq!(order_key("S1", None, Some("ord-9")), "ord-9");
/// ```
pub fn order_key(seller_id: &str, date: Option<NaiveDate>, order_id: Option<&str>) -> String {
    let seller_id = seller_id.trim();
    match date {
        Some(date) if !seller_id.is_empty() => {
            format!("{}{}{}", seller_id, ORDER_KEY_SEPARATOR, date.format("%Y-%m-%d"))
        }
        _ => order_id.map(|id| id.trim().to_string()).unwrap_or_default(),
    }
}

// =============================================================================
// Vendor Order Row
// =============================================================================

/// One ledger line: a seller's stock of one product from one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct VendorOrderRow {
    pub id: String,

    /// Groups rows of one (seller, date) batch. See [`order_key`].
    pub order_key: String,

    /// Raw upstream order identifier, when known.
    pub order_id: Option<String>,

    /// Batch date; drives FIFO ordering.
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,

    pub seller_id: String,
    pub seller_name: String,

    pub product_id: String,
    pub product_name: String,
    pub category: String,

    /// Which price list applies to this row.
    pub branch: Branch,

    /// Atomic units in one package.
    pub units_per_package: i64,

    /// Packages currently associated with the row.
    /// Changed by transfers only, never by sales.
    pub packages: i64,

    pub remaining_packages: Option<i64>,
    pub remaining_units: Option<i64>,

    /// Cost per package paid to the supplier.
    pub provider_price_cents: i64,

    /// Sale price per package, per branch.
    pub unit_price_rivas_cents: i64,
    pub unit_price_san_jorge_cents: i64,
    pub unit_price_isla_cents: i64,

    /// Stored ordered units (legacy rows).
    pub total_units: Option<i64>,
    /// Directly stored line total (legacy rows, or materialized by a transfer).
    pub line_total_cents: Option<i64>,
    /// Per-unit vendor price (legacy rows).
    pub unit_price_vendor_cents: Option<i64>,
    /// Materialized on rows created by a transfer.
    pub gross_profit_cents: Option<i64>,
    /// Materialized on rows created by a transfer.
    pub vendor_commission_cents: Option<i64>,

    /// Running signed sum of packages moved in (+) and out (-).
    pub transfer_delta: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
}

impl VendorOrderRow {
    /// Units per package usable as a divisor (legacy zeroes read as 1).
    #[inline]
    pub fn unit_divisor(&self) -> i64 {
        self.units_per_package.max(1)
    }

    /// Units still available, reconciled from whichever counter is present.
    pub fn available_units(&self) -> i64 {
        match (self.remaining_units, self.remaining_packages) {
            (Some(units), _) => units.max(0),
            (None, Some(packages)) => packages.saturating_mul(self.unit_divisor()).max(0),
            (None, None) => 0,
        }
    }

    /// Packages still available, reconciled from whichever counter is present.
    pub fn available_packages(&self) -> i64 {
        match (self.remaining_packages, self.remaining_units) {
            (Some(packages), _) => packages.max(0),
            (None, Some(units)) => (units / self.unit_divisor()).max(0),
            (None, None) => 0,
        }
    }

    /// Units the row was issued with (stored value wins when positive).
    pub fn ordered_units(&self) -> i64 {
        match self.total_units {
            Some(units) if units > 0 => units,
            _ => self.packages.saturating_mul(self.unit_divisor()).max(0),
        }
    }

    /// The row's own sale price per package for a branch.
    pub fn branch_price(&self, branch: Branch) -> Money {
        Money::from_cents(match branch {
            Branch::Rivas => self.unit_price_rivas_cents,
            Branch::SanJorge => self.unit_price_san_jorge_cents,
            Branch::Isla => self.unit_price_isla_cents,
        })
    }

    #[inline]
    pub fn provider_price(&self) -> Money {
        Money::from_cents(self.provider_price_cents)
    }

    pub fn unit_price_vendor(&self) -> Option<Money> {
        self.unit_price_vendor_cents
            .filter(|cents| *cents > 0)
            .map(Money::from_cents)
    }

    pub fn stored_line_total(&self) -> Option<Money> {
        self.line_total_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Transfer Record
// =============================================================================

/// Immutable audit entry for one package transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TransferRecord {
    pub id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub date: NaiveDate,

    pub created_by_email: String,
    pub created_by_name: String,

    pub product_id: String,
    pub product_name: String,

    /// Pricing snapshot at transfer time.
    pub provider_price_cents: i64,
    pub unit_price_rivas_cents: i64,
    pub unit_price_san_jorge_cents: i64,
    pub unit_price_isla_cents: i64,

    pub packages_moved: i64,

    pub from_seller_id: String,
    pub from_seller_name: String,
    pub from_order_key: String,
    pub from_vendor_row_id: String,

    pub to_seller_id: String,
    pub to_seller_name: String,
    pub to_order_key: String,
    pub to_vendor_row_id: String,

    pub comment: String,
    pub dest_row_was_new: bool,
}

/// Who performed a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub email: String,
    pub name: String,
}

impl Actor {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            email: email.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Seller Directory
// =============================================================================

/// A vendor (selling agent) from the seller directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub branch: Branch,
    /// Share of gross profit paid to the vendor, in percent.
    pub commission_percent: f64,
}

impl Seller {
    /// Commission clamped to zero for negative directory values.
    #[inline]
    pub fn commission_rate(&self) -> CommissionRate {
        CommissionRate::from_percentage(self.commission_percent)
    }
}

// =============================================================================
// Price Catalog Entry
// =============================================================================

/// Branch prices of a product as issued with one order.
/// The entry with the latest `order_created_at` is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CatalogEntry {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub provider_price_cents: i64,
    pub price_rivas_cents: i64,
    pub price_san_jorge_cents: i64,
    pub price_isla_cents: i64,
    #[ts(as = "String")]
    pub order_created_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn price_for(&self, branch: Branch) -> Money {
        Money::from_cents(match branch {
            Branch::Rivas => self.price_rivas_cents,
            Branch::SanJorge => self.price_san_jorge_cents,
            Branch::Isla => self.price_isla_cents,
        })
    }
}

// =============================================================================
// Sale Allocation
// =============================================================================

/// Units drawn from one row by a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationEntry {
    pub vendor_row_id: String,
    pub units_taken: i64,
}

/// The result of drawing a sale's units from a seller's rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleAllocation {
    pub seller_id: String,
    pub product_id: String,
    pub requested_units: i64,
    pub allocated_units: i64,
    pub entries: Vec<AllocationEntry>,
}

impl SaleAllocation {
    /// Units the sale asked for but no row could supply.
    #[inline]
    pub fn shortfall_units(&self) -> i64 {
        (self.requested_units - self.allocated_units).max(0)
    }

    #[inline]
    pub fn is_satisfied(&self) -> bool {
        self.shortfall_units() == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
