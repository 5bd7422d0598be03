//! # Financial Aggregation
//!
//! Derived money figures per vendor row and per order: expected revenue,
//! sold and remaining value, gross profit and the vendor/investor split.
//!
//! ## Fallback Chains
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price_per_package(branch)                                             │
//! │    1. latest catalog entry for the product, branch price (> 0)         │
//! │    2. the row's own stored branch price                                │
//! │                                                                         │
//! │  line_total_expected  (first non-zero wins)                            │
//! │    1. price_per_package × packages                                     │
//! │    2. stored line total                                                │
//! │    3. unit_price_vendor × ordered_units                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The order of each chain is a business rule; the tiers are kept as
//! separate candidates instead of being folded into one expression.
//!
//! Nothing here fails. Missing numbers count as zero so that a report over
//! partially migrated rows always renders.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Branch, CatalogEntry, CommissionRate, Seller, VendorOrderRow};

// =============================================================================
// Price Catalog
// =============================================================================

/// Latest catalog entry per product.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl PriceCatalog {
    pub fn new() -> Self {
        PriceCatalog::default()
    }

    /// Builds a catalog keeping, per product, the entry of the most recently
    /// created order. On equal timestamps the entry seen last wins.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = PriceCatalog::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    /// Inserts an entry unless a strictly newer one is already present.
    pub fn insert(&mut self, entry: CatalogEntry) {
        match self.entries.get(&entry.product_id) {
            Some(current) if current.order_created_at > entry.order_created_at => {}
            _ => {
                self.entries.insert(entry.product_id.clone(), entry);
            }
        }
    }

    pub fn get(&self, product_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(product_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Per-Row Figures
// =============================================================================

/// Sale price per package for `branch`.
pub fn price_per_package(
    row: &VendorOrderRow,
    branch: Branch,
    catalog_entry: Option<&CatalogEntry>,
) -> Money {
    let candidates = [
        catalog_entry
            .map(|entry| entry.price_for(branch))
            .filter(|price| price.is_positive()),
        Some(row.branch_price(branch)),
    ];

    candidates.into_iter().flatten().next().unwrap_or_default()
}

/// Expected revenue of a row. See the module docs for the tier order.
pub fn line_total_expected(row: &VendorOrderRow, price_per_package: Money) -> Money {
    let tiers: [&dyn Fn() -> Option<Money>; 3] = [
        &|| Some(price_per_package * row.packages),
        &|| row.stored_line_total(),
        &|| row.unit_price_vendor().map(|p| p * row.ordered_units()),
    ];

    tiers
        .iter()
        .find_map(|tier| tier().and_then(Money::non_zero))
        .unwrap_or_default()
}

/// Every derived figure of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RowFinancials {
    pub row_id: String,
    pub order_key: String,
    pub seller_id: String,
    pub product_id: String,
    pub branch: Branch,
    pub price_per_package: Money,
    pub ordered_units: i64,
    pub sold_units: i64,
    pub remaining_units: i64,
    pub line_total_expected: Money,
    pub line_sold_value: Money,
    pub line_remaining_value: Money,
    pub gross_profit_per_package: Money,
    pub gross_profit: Money,
    pub vendor_share: Money,
    pub investor_share: Money,
}

/// Computes the figures of one row at its own branch.
pub fn row_financials(
    row: &VendorOrderRow,
    catalog: &PriceCatalog,
    commission: CommissionRate,
) -> RowFinancials {
    let price = price_per_package(row, row.branch, catalog.get(&row.product_id));
    let line_total = line_total_expected(row, price);

    let ordered_units = row.ordered_units();
    let remaining_units = row.available_units();
    let sold_units = (ordered_units - remaining_units).max(0);

    let line_sold_value = match row.unit_price_vendor() {
        Some(unit_price) => unit_price * sold_units,
        None => line_total.prorate(sold_units, ordered_units),
    };

    let gross_profit_per_package = price - row.provider_price();
    let gross_profit = gross_profit_per_package * row.packages;
    let split = split_profit(gross_profit, commission);

    RowFinancials {
        row_id: row.id.clone(),
        order_key: row.order_key.clone(),
        seller_id: row.seller_id.clone(),
        product_id: row.product_id.clone(),
        branch: row.branch,
        price_per_package: price,
        ordered_units,
        sold_units,
        remaining_units,
        line_total_expected: line_total,
        line_sold_value,
        line_remaining_value: line_total - line_sold_value,
        gross_profit_per_package,
        gross_profit,
        vendor_share: split.vendor,
        investor_share: split.investor,
    }
}

/// Gross profit divided between vendor and investor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitSplit {
    pub vendor: Money,
    pub investor: Money,
}

/// `vendor = profit × commission`, `investor = profit - vendor`.
///
/// ```rust
/// use dulce_core::finance::split_profit;
/// use dulce_core::money::Money;
/// use dulce_core::types::CommissionRate;
///
/// let split = split_profit(Money::from_cents(10_000), CommissionRate::from_percentage(25.0));
/// assert_eq!(split.vendor.cents(), 2_500);
/// assert_eq!(split.investor.cents(), 7_500);
/// ```
pub fn split_profit(gross_profit: Money, commission: CommissionRate) -> ProfitSplit {
    let vendor = gross_profit.percentage(commission);
    ProfitSplit {
        vendor,
        investor: gross_profit - vendor,
    }
}

// =============================================================================
// Per-Order Rollup
// =============================================================================

/// Plain sums of row figures sharing one `order_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderSummary {
    pub order_key: String,
    pub seller_id: String,
    pub seller_name: String,
    #[ts(as = "Option<String>")]
    pub date: Option<NaiveDate>,
    pub row_count: usize,
    pub packages: i64,
    pub total_expected: Money,
    pub sold: Money,
    pub remaining: Money,
    pub gross_profit: Money,
    pub commission: Money,
    pub investor_share: Money,
    pub net_expected: Money,
}

/// Commission per seller id, from the seller directory.
pub fn commission_rates(sellers: &[Seller]) -> HashMap<String, CommissionRate> {
    sellers
        .iter()
        .map(|s| (s.id.clone(), s.commission_rate()))
        .collect()
}

/// Figures for every row, rows of unknown sellers at zero commission.
pub fn rows_financials(
    rows: &[VendorOrderRow],
    catalog: &PriceCatalog,
    commissions: &HashMap<String, CommissionRate>,
) -> Vec<RowFinancials> {
    rows.iter()
        .map(|row| {
            let rate = commissions.get(&row.seller_id).copied().unwrap_or_default();
            row_financials(row, catalog, rate)
        })
        .collect()
}

/// Rolls rows up per order, sorted by order key.
pub fn summarize_orders(
    rows: &[VendorOrderRow],
    catalog: &PriceCatalog,
    commissions: &HashMap<String, CommissionRate>,
) -> Vec<OrderSummary> {
    let mut orders: BTreeMap<String, OrderSummary> = BTreeMap::new();

    for row in rows {
        let rate = commissions.get(&row.seller_id).copied().unwrap_or_default();
        let figures = row_financials(row, catalog, rate);

        let summary = orders
            .entry(row.order_key.clone())
            .or_insert_with(|| OrderSummary {
                order_key: row.order_key.clone(),
                seller_id: row.seller_id.clone(),
                seller_name: row.seller_name.clone(),
                date: row.date,
                row_count: 0,
                packages: 0,
                total_expected: Money::zero(),
                sold: Money::zero(),
                remaining: Money::zero(),
                gross_profit: Money::zero(),
                commission: Money::zero(),
                investor_share: Money::zero(),
                net_expected: Money::zero(),
            });

        summary.row_count += 1;
        summary.packages = summary.packages.saturating_add(row.packages);
        summary.total_expected += figures.line_total_expected;
        summary.sold += figures.line_sold_value;
        summary.remaining += figures.line_remaining_value;
        summary.gross_profit += figures.gross_profit;
        summary.commission += figures.vendor_share;
        summary.investor_share += figures.investor_share;
    }

    orders
        .into_values()
        .map(|mut summary| {
            summary.net_expected = summary.total_expected - summary.commission;
            summary
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{catalog_entry, row};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_price_prefers_catalog() {
        let r = row("A", "2024-01-01", 5, 10);
        let entry = catalog_entry("P1", 4000, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        assert_eq!(price_per_package(&r, Branch::Rivas, Some(&entry)).cents(), 4000);
        assert_eq!(price_per_package(&r, Branch::Rivas, None).cents(), 3000);
    }

    #[test]
    fn test_price_falls_back_when_catalog_price_is_zero() {
        let r = row("A", "2024-01-01", 5, 10);
        let mut entry = catalog_entry("P1", 4000, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        entry.price_isla_cents = 0;

        assert_eq!(price_per_package(&r, Branch::Isla, Some(&entry)).cents(), 3500);
    }

    #[test]
    fn test_catalog_latest_entry_wins() {
        let old = catalog_entry("P1", 1000, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let new = catalog_entry("P1", 2000, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let catalog = PriceCatalog::from_entries(vec![new.clone(), old.clone()]);
        assert_eq!(catalog.get("P1").unwrap().price_rivas_cents, 2000);

        let catalog = PriceCatalog::from_entries(vec![old, new]);
        assert_eq!(catalog.get("P1").unwrap().price_rivas_cents, 2000);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_line_total_tiers() {
        let mut r = row("A", "2024-01-01", 5, 10);

        // Tier 1
        assert_eq!(line_total_expected(&r, Money::from_cents(3000)).cents(), 15_000);

        // Tier 2: no price
        r.line_total_cents = Some(12_345);
        assert_eq!(line_total_expected(&r, Money::zero()).cents(), 12_345);

        // Tier 3: no price, no stored total
        r.line_total_cents = Some(0);
        r.unit_price_vendor_cents = Some(250);
        r.total_units = Some(48);
        assert_eq!(line_total_expected(&r, Money::zero()).cents(), 250 * 48);

        // Nothing known
        r.unit_price_vendor_cents = None;
        assert!(line_total_expected(&r, Money::zero()).is_zero());
    }

    #[test]
    fn test_fallback_to_unit_price_vendor_times_ordered_units() {
        let mut r = row("L", "2024-01-01", 0, 12);
        r.unit_price_rivas_cents = 0;
        r.packages = 0;
        r.total_units = Some(36);
        r.unit_price_vendor_cents = Some(300);

        let f = row_financials(&r, &PriceCatalog::new(), CommissionRate::zero());
        assert_eq!(f.line_total_expected.cents(), 300 * 36);
    }

    #[test]
    fn test_row_financials_sold_and_split() {
        // 5 packages × 10 units, 2 packages' worth sold
        let mut r = row("A", "2024-01-01", 5, 10);
        r.remaining_units = Some(30);
        r.remaining_packages = Some(3);

        let f = row_financials(&r, &PriceCatalog::new(), CommissionRate::from_percentage(20.0));

        assert_eq!(f.ordered_units, 50);
        assert_eq!(f.sold_units, 20);
        assert_eq!(f.line_total_expected.cents(), 15_000);
        // Prorated: 15000 × 20 / 50
        assert_eq!(f.line_sold_value.cents(), 6_000);
        assert_eq!(f.line_remaining_value.cents(), 9_000);
        // (3000 - 2000) × 5
        assert_eq!(f.gross_profit.cents(), 5_000);
        assert_eq!(f.vendor_share.cents(), 1_000);
        assert_eq!(f.investor_share.cents(), 4_000);
    }

    #[test]
    fn test_sold_value_uses_unit_price_when_known() {
        let mut r = row("A", "2024-01-01", 5, 10);
        r.remaining_units = Some(40);
        r.unit_price_vendor_cents = Some(320);

        let f = row_financials(&r, &PriceCatalog::new(), CommissionRate::zero());
        assert_eq!(f.line_sold_value.cents(), 3_200);
    }

    #[test]
    fn test_sold_units_never_negative() {
        // Legacy row holding more remaining units than it was issued
        let mut r = row("A", "2024-01-01", 2, 10);
        r.remaining_units = Some(35);
        let f = row_financials(&r, &PriceCatalog::new(), CommissionRate::zero());
        assert_eq!(f.sold_units, 0);
        assert!(f.line_sold_value.is_zero());
    }

    #[test]
    fn test_negative_commission_is_clamped() {
        let r = row("A", "2024-01-01", 5, 10);
        let f = row_financials(&r, &PriceCatalog::new(), CommissionRate::from_percentage(-15.0));
        assert!(f.vendor_share.is_zero());
        assert_eq!(f.investor_share, f.gross_profit);
    }

    #[test]
    fn test_order_rollup_and_idempotence() {
        let a = row("A", "2024-01-01", 5, 10);
        let mut b = row("B", "2024-01-01", 3, 10);
        b.product_id = "P2".into();
        let mut c = row("C", "2024-01-05", 2, 10);
        c.order_key = "S1__2024-01-05".into();

        let sellers = vec![Seller {
            id: "S1".into(),
            name: "Ana".into(),
            branch: Branch::Rivas,
            commission_percent: 10.0,
        }];
        let rates = commission_rates(&sellers);
        let rows = vec![c.clone(), a.clone(), b.clone()];

        let first = summarize_orders(&rows, &PriceCatalog::new(), &rates);
        let second = summarize_orders(&rows, &PriceCatalog::new(), &rates);
        assert_eq!(first, second);

        assert_eq!(first.len(), 2);
        let jan1 = &first[0];
        assert_eq!(jan1.order_key, "S1__2024-01-01");
        assert_eq!(jan1.row_count, 2);
        assert_eq!(jan1.packages, 8);
        assert_eq!(jan1.total_expected.cents(), 24_000);
        assert_eq!(jan1.gross_profit.cents(), 8_000);
        assert_eq!(jan1.commission.cents(), 800);
        assert_eq!(jan1.net_expected.cents(), 24_000 - 800);

        let per_row = rows_financials(&[a, b], &PriceCatalog::new(), &rates);
        let summed: Money = per_row.iter().map(|f| f.line_total_expected).sum();
        assert_eq!(summed, jan1.total_expected);
    }

    #[test]
    fn test_unknown_seller_has_zero_commission() {
        let r = row("A", "2024-01-01", 5, 10);
        let summaries = summarize_orders(&[r], &PriceCatalog::new(), &HashMap::new());
        assert!(summaries[0].commission.is_zero());
        assert_eq!(summaries[0].net_expected, summaries[0].total_expected);
    }

    #[test]
    fn test_corrupt_counts_saturate_instead_of_panicking() {
        let mut corrupt = row("X", "2024-01-01", 1, 12);
        corrupt.packages = i64::MAX;
        corrupt.remaining_packages = Some(i64::MAX);
        corrupt.remaining_units = None;
        let healthy = row("A", "2024-01-01", 5, 10);

        let figures = row_financials(&corrupt, &PriceCatalog::new(), CommissionRate::from_percentage(10.0));
        assert_eq!(figures.ordered_units, i64::MAX);
        assert_eq!(figures.line_total_expected.cents(), i64::MAX);
        assert!(figures.gross_profit.is_positive());

        let mut rates = HashMap::new();
        rates.insert("S1".to_string(), CommissionRate::from_percentage(10.0));
        let summaries = summarize_orders(&[corrupt, healthy], &PriceCatalog::new(), &rates);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_expected.cents(), i64::MAX);
        assert_eq!(summaries[0].packages, i64::MAX);
    }
}
