//! # Package Transfers
//!
//! Moves remaining packages of one product from an origin vendor row to a
//! destination row, without a sale taking place.
//!
//! ## Destinations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ExistingRow { row_id }         credit that row                         │
//! │                                                                         │
//! │  ExistingOrder { order_key }    credit the order's row for the product, │
//! │                                 or create one on that order             │
//! │                                                                         │
//! │  NewOrder { seller_id, date }   order `seller_id__date`; credit its row │
//! │                                 for the product if it already exists,   │
//! │                                 otherwise create one                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Split of Work
//! - [`validate_request`] checks everything that needs no stored state.
//! - The persistence layer reads the origin and resolves the destination into
//!   a [`ResolvedDestination`].
//! - [`plan_transfer`] checks the remaining preconditions against those fresh
//!   reads and returns the full set of writes as a [`TransferPlan`].
//!
//! Row versions are left untouched here; the writer bumps them and uses the
//! values read as the optimistic-concurrency check.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::finance::{line_total_expected, price_per_package, split_profit};
use crate::types::{
    Actor, Branch, CatalogEntry, CommissionRate, TransferRecord, VendorOrderRow,
};
use crate::validation::{validate_comment, validate_id, validate_packages_to_move};

// =============================================================================
// Request Types
// =============================================================================

/// Where the packages should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferDestination {
    ExistingRow {
        row_id: String,
    },
    ExistingOrder {
        order_key: String,
    },
    NewOrder {
        seller_id: String,
        #[ts(as = "Option<String>")]
        date: Option<NaiveDate>,
    },
}

/// A transfer as submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferRequest {
    pub origin_row_id: String,
    pub packages: i64,
    pub comment: String,
    pub destination: Option<TransferDestination>,
    pub actor: Actor,
}

/// Caller-level business rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransferPolicy {
    /// Allow crediting another row of the origin seller through any
    /// destination kind. When off, the origin seller can only receive via a
    /// new order on a different date.
    pub allow_same_seller: bool,
}

/// A request that passed the stateless checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub comment: String,
    pub destination: TransferDestination,
}

/// Checks every precondition that does not depend on stored rows.
///
/// Order: package count, comment, destination.
pub fn validate_request(request: &TransferRequest) -> CoreResult<ValidatedRequest> {
    validate_packages_to_move(request.packages)?;

    let comment = validate_comment(&request.comment).map_err(|err| match err {
        ValidationError::Required { .. } => CoreError::MissingComment,
        other => CoreError::Validation(other),
    })?;

    validate_id("origin_row_id", &request.origin_row_id)?;

    let destination = match &request.destination {
        None => return Err(CoreError::MissingDestination),
        Some(TransferDestination::ExistingRow { row_id }) if row_id.trim().is_empty() => {
            return Err(CoreError::MissingDestination)
        }
        Some(TransferDestination::ExistingOrder { order_key }) if order_key.trim().is_empty() => {
            return Err(CoreError::MissingDestination)
        }
        Some(TransferDestination::NewOrder { seller_id, date })
            if seller_id.trim().is_empty() || date.is_none() =>
        {
            return Err(CoreError::MissingDestination)
        }
        Some(destination) => destination.clone(),
    };

    Ok(ValidatedRequest {
        comment,
        destination,
    })
}

// =============================================================================
// Resolved Destination
// =============================================================================

/// Everything needed to open a new row on a destination order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRowTarget {
    pub order_key: String,
    pub order_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub seller_id: String,
    pub seller_name: String,
    pub branch: Branch,
    pub commission: CommissionRate,
}

/// The destination after the persistence layer looked it up.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDestination {
    /// A stored row to credit (freshly read).
    Existing(VendorOrderRow),
    /// No row for the product on the destination order; open one.
    NewRow(NewRowTarget),
}

impl ResolvedDestination {
    fn seller_id(&self) -> &str {
        match self {
            ResolvedDestination::Existing(row) => &row.seller_id,
            ResolvedDestination::NewRow(target) => &target.seller_id,
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// What happens to the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationWrite {
    Credit(VendorOrderRow),
    Create(VendorOrderRow),
}

impl DestinationWrite {
    pub fn row(&self) -> &VendorOrderRow {
        match self {
            DestinationWrite::Credit(row) | DestinationWrite::Create(row) => row,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, DestinationWrite::Create(_))
    }
}

/// The complete, all-or-nothing set of writes of one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub origin: VendorOrderRow,
    pub destination: DestinationWrite,
    pub record: TransferRecord,
}

/// Checks the stateful preconditions and computes both legs and the record.
///
/// `origin` and an existing destination must be the rows as just read inside
/// the transaction that will apply the plan. `catalog_entry` is the latest
/// catalog entry of the product, used to price a newly created row.
pub fn plan_transfer(
    request: &TransferRequest,
    origin: &VendorOrderRow,
    destination: ResolvedDestination,
    catalog_entry: Option<&CatalogEntry>,
    policy: TransferPolicy,
    now: DateTime<Utc>,
) -> CoreResult<TransferPlan> {
    let validated = validate_request(request)?;
    let packages = request.packages;

    if origin.id != request.origin_row_id {
        return Err(CoreError::RowNotFound(request.origin_row_id.clone()));
    }

    let available = origin.available_packages();
    if available < packages {
        return Err(CoreError::InsufficientStock {
            row_id: origin.id.clone(),
            available,
            requested: packages,
        });
    }

    if let ResolvedDestination::Existing(dest) = &destination {
        if dest.id == origin.id {
            return Err(CoreError::SameRow(origin.id.clone()));
        }
        if dest.product_id != origin.product_id {
            return Err(CoreError::ProductMismatch {
                origin: origin.product_id.clone(),
                destination: dest.product_id.clone(),
            });
        }
    }

    check_same_seller(&validated.destination, &destination, origin, policy)?;

    let origin_after = debit_origin(origin, packages, now);
    let destination_write = match destination {
        ResolvedDestination::Existing(dest) => {
            DestinationWrite::Credit(credit_existing(&dest, packages, now))
        }
        ResolvedDestination::NewRow(target) => {
            DestinationWrite::Create(open_row(origin, &target, packages, catalog_entry, now))
        }
    };

    let record = build_record(
        &validated.comment,
        &request.actor,
        origin,
        &destination_write,
        packages,
        now,
    );

    Ok(TransferPlan {
        origin: origin_after,
        destination: destination_write,
        record,
    })
}

/// Same-seller re-assignment is only allowed through a new order on a
/// different date, unless the caller's policy says otherwise.
fn check_same_seller(
    requested: &TransferDestination,
    resolved: &ResolvedDestination,
    origin: &VendorOrderRow,
    policy: TransferPolicy,
) -> CoreResult<()> {
    if policy.allow_same_seller || resolved.seller_id() != origin.seller_id {
        return Ok(());
    }

    match requested {
        TransferDestination::NewOrder { date, .. } if *date != origin.date => Ok(()),
        _ => Err(CoreError::SameSeller {
            seller_id: origin.seller_id.clone(),
        }),
    }
}

fn debit_origin(origin: &VendorOrderRow, packages: i64, now: DateTime<Utc>) -> VendorOrderRow {
    let mut row = origin.clone();
    let available_units = origin.available_units();

    row.packages = row.packages.saturating_sub(packages);
    row.remaining_packages = Some(origin.available_packages() - packages);
    row.remaining_units = if origin.units_per_package > 0 {
        let moved_units = packages.saturating_mul(origin.units_per_package);
        Some(available_units.saturating_sub(moved_units).max(0))
    } else {
        origin.remaining_units
    };
    row.transfer_delta -= packages;
    row.updated_at = now;
    row
}

fn credit_existing(dest: &VendorOrderRow, packages: i64, now: DateTime<Utc>) -> VendorOrderRow {
    let mut row = dest.clone();
    let available_units = dest.available_units();

    let moved_units = packages.saturating_mul(dest.units_per_package.max(0));

    row.packages = row.packages.saturating_add(packages);
    row.remaining_packages = Some(dest.available_packages().saturating_add(packages));
    row.remaining_units = Some(available_units.saturating_add(moved_units));
    row.transfer_delta += packages;
    row.updated_at = now;
    row
}

fn open_row(
    origin: &VendorOrderRow,
    target: &NewRowTarget,
    packages: i64,
    catalog_entry: Option<&CatalogEntry>,
    now: DateTime<Utc>,
) -> VendorOrderRow {
    let units_per_package = origin.unit_divisor();

    let mut row = VendorOrderRow {
        id: Uuid::new_v4().to_string(),
        order_key: target.order_key.clone(),
        order_id: target.order_id.clone(),
        date: target.date,
        seller_id: target.seller_id.clone(),
        seller_name: target.seller_name.clone(),
        product_id: origin.product_id.clone(),
        product_name: origin.product_name.clone(),
        category: origin.category.clone(),
        branch: target.branch,
        units_per_package,
        packages,
        remaining_packages: Some(packages),
        remaining_units: Some(packages.saturating_mul(units_per_package)),
        provider_price_cents: origin.provider_price_cents,
        unit_price_rivas_cents: origin.unit_price_rivas_cents,
        unit_price_san_jorge_cents: origin.unit_price_san_jorge_cents,
        unit_price_isla_cents: origin.unit_price_isla_cents,
        total_units: None,
        line_total_cents: None,
        unit_price_vendor_cents: None,
        gross_profit_cents: None,
        vendor_commission_cents: None,
        transfer_delta: 0,
        created_at: now,
        updated_at: now,
        version: 0,
    };

    let price = price_per_package(&row, target.branch, catalog_entry);
    let line_total = line_total_expected(&row, price);
    let gross_profit = (price - row.provider_price()) * packages;
    let split = split_profit(gross_profit, target.commission);

    row.line_total_cents = Some(line_total.cents());
    row.gross_profit_cents = Some(gross_profit.cents());
    row.vendor_commission_cents = Some(split.vendor.cents());
    row
}

fn build_record(
    comment: &str,
    actor: &Actor,
    origin: &VendorOrderRow,
    destination: &DestinationWrite,
    packages: i64,
    now: DateTime<Utc>,
) -> TransferRecord {
    let dest = destination.row();

    TransferRecord {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        date: now.date_naive(),
        created_by_email: actor.email.clone(),
        created_by_name: actor.name.clone(),
        product_id: origin.product_id.clone(),
        product_name: origin.product_name.clone(),
        provider_price_cents: origin.provider_price_cents,
        unit_price_rivas_cents: origin.unit_price_rivas_cents,
        unit_price_san_jorge_cents: origin.unit_price_san_jorge_cents,
        unit_price_isla_cents: origin.unit_price_isla_cents,
        packages_moved: packages,
        from_seller_id: origin.seller_id.clone(),
        from_seller_name: origin.seller_name.clone(),
        from_order_key: origin.order_key.clone(),
        from_vendor_row_id: origin.id.clone(),
        to_seller_id: dest.seller_id.clone(),
        to_seller_name: dest.seller_name.clone(),
        to_order_key: dest.order_key.clone(),
        to_vendor_row_id: dest.id.clone(),
        comment: comment.to_string(),
        dest_row_was_new: destination.is_new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
