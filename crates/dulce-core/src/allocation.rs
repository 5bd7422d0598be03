//! # FIFO Sale Allocation
//!
//! Decides which vendor rows a sale draws its units from.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale: seller S, product P, 70 units                                   │
//! │                                                                         │
//! │  Candidates (S, P, available > 0), oldest batch first:                 │
//! │    row A  2024-01-01   50 units  ──► take 50  → 0 units, 0 packages    │
//! │    row B  2024-01-05   30 units  ──► take 20  → 10 units, 1 package    │
//! │                                                                         │
//! │  Demand met → stop. Allocation: [(A, 50), (B, 20)]                     │
//! │                                                                         │
//! │  Not enough stock? The sale still goes through; the plan reports a     │
//! │  shortfall and the caller logs it.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Planning is pure. Writing the updated rows back is done by
//! `dulce_db::Ledger::allocate_sale`.

use std::cmp::Ordering;

use crate::types::{AllocationEntry, SaleAllocation, VendorOrderRow};

/// The outcome of planning one sale allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub allocation: SaleAllocation,
    /// Touched rows with their new remaining counters, in draw order.
    pub updated_rows: Vec<VendorOrderRow>,
}

/// FIFO ordering: batch date ascending (undated rows last), then creation
/// time, then id so repeated runs are deterministic.
pub fn fifo_cmp(a: &VendorOrderRow, b: &VendorOrderRow) -> Ordering {
    let by_date = match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_date
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Plans a FIFO draw-down of `quantity_units` for one seller and product.
///
/// `rows` may contain rows of other sellers, other products or without stock;
/// they are ignored. Negative quantities are treated as zero.
///
/// ## Example
/// ```rust,ignore
/// let plan = plan_allocation("S1", "P1", &rows, 70);
/// assert_eq!(plan.allocation.allocated_units, 70);
/// ```
pub fn plan_allocation(
    seller_id: &str,
    product_id: &str,
    rows: &[VendorOrderRow],
    quantity_units: i64,
) -> AllocationPlan {
    let requested = quantity_units.max(0);

    let mut allocation = SaleAllocation {
        seller_id: seller_id.to_string(),
        product_id: product_id.to_string(),
        requested_units: requested,
        allocated_units: 0,
        entries: Vec::new(),
    };

    if requested == 0 {
        return AllocationPlan {
            allocation,
            updated_rows: Vec::new(),
        };
    }

    let mut candidates: Vec<&VendorOrderRow> = rows
        .iter()
        .filter(|r| r.seller_id == seller_id && r.product_id == product_id)
        .filter(|r| r.available_units() > 0)
        .collect();
    candidates.sort_by(|a, b| fifo_cmp(a, b));

    let mut needed = requested;
    let mut updated_rows = Vec::new();

    for candidate in candidates {
        if needed == 0 {
            break;
        }

        let available = candidate.available_units();
        let take = available.min(needed);
        let left = available - take;

        let mut row = candidate.clone();
        row.remaining_units = Some(left);
        row.remaining_packages = Some(left / row.unit_divisor());

        allocation.entries.push(AllocationEntry {
            vendor_row_id: row.id.clone(),
            units_taken: take,
        });
        allocation.allocated_units += take;
        needed -= take;
        updated_rows.push(row);
    }

    AllocationPlan {
        allocation,
        updated_rows,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
