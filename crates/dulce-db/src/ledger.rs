//! # Ledger Operations
//!
//! The multi-row operations of the vendor ledger, each executed as one
//! optimistic SQLite transaction.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Ledger Operation                                 │
//! │                                                                         │
//! │  attempt:                                                               │
//! │    BEGIN IMMEDIATE  (write lock first; waits up to busy_timeout)        │
//! │    read rows (each carries its version)                                 │
//! │    plan with dulce-core (pure; may reject → rollback, no retry)         │
//! │    UPDATE ... WHERE id = ? AND version = ?   (for every touched row)    │
//! │    INSERT new row / transfer record                                     │
//! │    COMMIT                                                               │
//! │                                                                         │
//! │  Conflict or Busy anywhere → rollback, back off (exponential, jitter),  │
//! │  start a new attempt from a fresh read, up to `RetryPolicy::limit`      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale allocation goes through the same primitive as transfers, so two
//! concurrent sales can never both draw the same units.
//!
//! Reports (`row_financials`, `order_summaries`) only read.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dulce_core::allocation::plan_allocation;
use dulce_core::finance::{commission_rates, row_financials, summarize_orders};
use dulce_core::transfer::{
    plan_transfer, validate_request, DestinationWrite, NewRowTarget, ResolvedDestination,
    TransferDestination, TransferPlan, TransferPolicy, TransferRequest,
};
use dulce_core::validation::validate_new_row;
use dulce_core::{
    order_key, CatalogEntry, CommissionRate, CoreError, OrderSummary, RowFinancials,
    SaleAllocation, TransferRecord, VendorOrderRow,
};

use crate::config::LedgerConfig;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::catalog::CatalogRepository;
use crate::repository::seller::SellerRepository;
use crate::repository::transfer::TransferRecordRepository;
use crate::repository::vendor_row::VendorRowRepository;

/// Extra attempts after a lost race when nothing else is configured.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// How a ledger operation that lost a race is re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub limit: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            limit: DEFAULT_RETRY_LIMIT,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff with the crate's default jitter (±50%). The
    /// attempt count, not elapsed time, ends the retries.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Entry point for ledger mutations and reports.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger().with_policy(config.transfer_policy());
///
/// let allocation = ledger.allocate_sale("S1", "P1", 70).await?;
/// let record = ledger.transfer_packages(&request).await?;
/// let report = ledger.order_summaries().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    policy: TransferPolicy,
    retry: RetryPolicy,
}

impl Ledger {
    pub fn new(db: Database) -> Self {
        Ledger {
            db,
            policy: TransferPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(db: Database, config: &LedgerConfig) -> Self {
        Ledger::new(db)
            .with_policy(config.transfer_policy())
            .with_retry_policy(config.retry_policy())
    }

    pub fn with_policy(mut self, policy: TransferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // =========================================================================
    // Sale Allocation
    // =========================================================================

    /// Draws `quantity_units` of a product from the seller's rows, oldest
    /// batch first, and persists the new remaining counters.
    ///
    /// Insufficient stock is not an error: whatever exists is allocated and
    /// the shortfall is logged. Callers must invoke this at most once per
    /// sale.
    pub async fn allocate_sale(
        &self,
        seller_id: &str,
        product_id: &str,
        quantity_units: i64,
    ) -> DbResult<SaleAllocation> {
        let allocation = self
            .with_retry("allocate_sale", move || {
                self.try_allocate_sale(seller_id, product_id, quantity_units)
            })
            .await?;

        if !allocation.is_satisfied() {
            warn!(
                seller_id,
                product_id,
                requested = allocation.requested_units,
                allocated = allocation.allocated_units,
                shortfall = allocation.shortfall_units(),
                "Sale exceeds available stock"
            );
        }

        info!(
            seller_id,
            product_id,
            units = allocation.allocated_units,
            rows = allocation.entries.len(),
            "Sale allocated"
        );

        Ok(allocation)
    }

    async fn try_allocate_sale(
        &self,
        seller_id: &str,
        product_id: &str,
        quantity_units: i64,
    ) -> DbResult<SaleAllocation> {
        let mut tx = self.db.begin_write().await?;

        let rows =
            VendorRowRepository::list_for_seller_product_in(&mut tx, seller_id, product_id).await?;
        let plan = plan_allocation(seller_id, product_id, &rows, quantity_units);

        let now = Utc::now();
        for row in &plan.updated_rows {
            let mut row = row.clone();
            row.updated_at = now;
            VendorRowRepository::update_versioned_in(&mut tx, &row).await?;
        }

        tx.commit().await?;
        Ok(plan.allocation)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Moves packages from one vendor row to another destination and appends
    /// the audit record, all or nothing.
    ///
    /// Rule violations come back as [`DbError::Ledger`] and leave the ledger
    /// untouched. A race lost more than `RetryPolicy::limit` times comes
    /// back as [`DbError::Conflict`] or [`DbError::Busy`].
    pub async fn transfer_packages(&self, request: &TransferRequest) -> DbResult<TransferRecord> {
        validate_request(request)?;

        let record = self
            .with_retry("transfer_packages", move || self.try_transfer(request))
            .await?;

        info!(
            transfer_id = %record.id,
            from_row = %record.from_vendor_row_id,
            to_row = %record.to_vendor_row_id,
            packages = record.packages_moved,
            new_row = record.dest_row_was_new,
            by = %record.created_by_email,
            "Packages transferred"
        );

        Ok(record)
    }

    async fn try_transfer(&self, request: &TransferRequest) -> DbResult<TransferRecord> {
        let mut tx = self.db.begin_write().await?;

        let origin = VendorRowRepository::get_by_id_in(&mut tx, &request.origin_row_id)
            .await?
            .ok_or_else(|| CoreError::RowNotFound(request.origin_row_id.clone()))?;

        let destination = request
            .destination
            .as_ref()
            .ok_or(CoreError::MissingDestination)?;
        let resolved = resolve_destination(&mut tx, destination, &origin).await?;

        let catalog_entry =
            CatalogRepository::latest_for_product_in(&mut tx, &origin.product_id).await?;

        let plan = plan_transfer(
            request,
            &origin,
            resolved,
            catalog_entry.as_ref(),
            self.policy,
            Utc::now(),
        )?;

        apply_transfer_plan(&mut tx, &plan).await?;
        tx.commit().await?;

        Ok(plan.record)
    }

    // =========================================================================
    // Order Issuance
    // =========================================================================

    /// Stores a freshly issued vendor order batch and records its prices in
    /// the catalog (one entry per product, stamped now).
    pub async fn issue_order(&self, rows: &[VendorOrderRow]) -> DbResult<()> {
        for row in rows {
            validate_new_row(row).map_err(CoreError::from)?;
        }

        let now = Utc::now();
        let mut tx = self.db.begin_write().await?;

        let mut priced: Vec<&str> = Vec::new();
        for row in rows {
            VendorRowRepository::insert_in(&mut tx, row).await?;

            if !priced.contains(&row.product_id.as_str()) {
                priced.push(&row.product_id);
                CatalogRepository::insert_in(&mut tx, &catalog_entry_for(row, now)).await?;
            }
        }

        tx.commit().await?;

        info!(rows = rows.len(), products = priced.len(), "Vendor order issued");
        Ok(())
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Derived figures of one row at its own branch.
    pub async fn row_financials(&self, row_id: &str) -> DbResult<RowFinancials> {
        let row = self
            .db
            .vendor_rows()
            .get_by_id(row_id)
            .await?
            .ok_or_else(|| CoreError::RowNotFound(row_id.to_string()))?;

        let catalog = self.db.catalog().load_catalog().await?;

        let mut conn = self.db.pool().acquire().await?;
        let commission = seller_commission(&mut conn, &row.seller_id).await?;

        Ok(row_financials(&row, &catalog, commission))
    }

    /// Rollup of every order in the ledger, sorted by order key.
    pub async fn order_summaries(&self) -> DbResult<Vec<OrderSummary>> {
        let rows = self.db.vendor_rows().list_all().await?;
        let catalog = self.db.catalog().load_catalog().await?;
        let sellers = self.db.sellers().list().await?;

        let rates = commission_rates(&sellers);
        warn_unknown_sellers(&rows, &rates);

        let summaries = summarize_orders(&rows, &catalog, &rates);
        debug!(orders = summaries.len(), rows = rows.len(), "Order summaries computed");

        Ok(summaries)
    }

    /// Rollup of one order.
    pub async fn order_summary(&self, order_key: &str) -> DbResult<OrderSummary> {
        let rows = self.db.vendor_rows().list_by_order(order_key).await?;
        let catalog = self.db.catalog().load_catalog().await?;
        let sellers = self.db.sellers().list().await?;

        let rates = commission_rates(&sellers);
        warn_unknown_sellers(&rows, &rates);

        summarize_orders(&rows, &catalog, &rates)
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::OrderNotFound(order_key.to_string()).into())
    }

    // =========================================================================
    // Retry
    // =========================================================================

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let limit = self.retry.limit;
        let mut retries = 0u32;

        backoff::future::retry(self.retry.backoff(), || {
            let retries_before = retries;
            retries += 1;
            let run = attempt();

            async move {
                run.await.map_err(|err| match err {
                    err if err.is_retryable() && retries_before < limit => {
                        warn!(
                            operation,
                            retry = retries_before + 1,
                            error = %err,
                            "Lost optimistic race, retrying"
                        );
                        backoff::Error::transient(err)
                    }
                    err if err.is_retryable() => {
                        warn!(
                            operation,
                            retries = retries_before,
                            error = %err,
                            "Giving up after retries"
                        );
                        backoff::Error::permanent(err)
                    }
                    err => backoff::Error::permanent(err),
                })
            }
        })
        .await
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Looks up the destination inside the transaction.
async fn resolve_destination(
    conn: &mut SqliteConnection,
    destination: &TransferDestination,
    origin: &VendorOrderRow,
) -> DbResult<ResolvedDestination> {
    match destination {
        TransferDestination::ExistingRow { row_id } => {
            let row = VendorRowRepository::get_by_id_in(conn, row_id)
                .await?
                .ok_or_else(|| CoreError::RowNotFound(row_id.clone()))?;
            Ok(ResolvedDestination::Existing(row))
        }

        TransferDestination::ExistingOrder { order_key } => {
            let rows = VendorRowRepository::list_by_order_in(conn, order_key).await?;
            let first = rows
                .first()
                .ok_or_else(|| CoreError::OrderNotFound(order_key.clone()))?;

            if let Some(row) = rows.iter().find(|r| r.product_id == origin.product_id) {
                return Ok(ResolvedDestination::Existing(row.clone()));
            }

            let commission = seller_commission(conn, &first.seller_id).await?;
            Ok(ResolvedDestination::NewRow(NewRowTarget {
                order_key: order_key.clone(),
                order_id: first.order_id.clone(),
                date: first.date,
                seller_id: first.seller_id.clone(),
                seller_name: first.seller_name.clone(),
                branch: first.branch,
                commission,
            }))
        }

        TransferDestination::NewOrder { seller_id, date } => {
            let seller = SellerRepository::get_by_id_in(conn, seller_id)
                .await?
                .ok_or_else(|| CoreError::SellerNotFound(seller_id.clone()))?;

            let key = order_key(&seller.id, *date, None);
            if let Some(row) =
                VendorRowRepository::find_in_order_in(conn, &key, &origin.product_id).await?
            {
                return Ok(ResolvedDestination::Existing(row));
            }

            Ok(ResolvedDestination::NewRow(NewRowTarget {
                order_key: key,
                order_id: None,
                date: *date,
                commission: seller.commission_rate(),
                seller_id: seller.id,
                seller_name: seller.name,
                branch: seller.branch,
            }))
        }
    }
}

/// Writes both legs and the record. Any stale version aborts with
/// [`DbError::Conflict`]; the caller's transaction then rolls back.
pub(crate) async fn apply_transfer_plan(
    conn: &mut SqliteConnection,
    plan: &TransferPlan,
) -> DbResult<()> {
    VendorRowRepository::update_versioned_in(conn, &plan.origin).await?;

    match &plan.destination {
        DestinationWrite::Credit(row) => {
            VendorRowRepository::update_versioned_in(conn, row).await?;
        }
        DestinationWrite::Create(row) => {
            VendorRowRepository::insert_in(conn, row).await?;
        }
    }

    TransferRecordRepository::insert_in(conn, &plan.record).await
}

/// Commission of a seller; sellers missing from the directory earn none.
async fn seller_commission(conn: &mut SqliteConnection, seller_id: &str) -> DbResult<CommissionRate> {
    match SellerRepository::get_by_id_in(conn, seller_id).await? {
        Some(seller) => Ok(seller.commission_rate()),
        None => {
            warn!(seller_id, "Seller missing from directory, using zero commission");
            Ok(CommissionRate::zero())
        }
    }
}

/// Rows whose seller is missing from the directory are reported at zero
/// commission; say so once per seller.
fn warn_unknown_sellers(rows: &[VendorOrderRow], rates: &HashMap<String, CommissionRate>) {
    let mut unknown: Vec<&str> = rows
        .iter()
        .map(|row| row.seller_id.as_str())
        .filter(|seller_id| !rates.contains_key(*seller_id))
        .collect();
    unknown.sort_unstable();
    unknown.dedup();

    for seller_id in unknown {
        warn!(seller_id, "Seller missing from directory, using zero commission");
    }
}

fn catalog_entry_for(row: &VendorOrderRow, now: chrono::DateTime<Utc>) -> CatalogEntry {
    CatalogEntry {
        id: Uuid::new_v4().to_string(),
        product_id: row.product_id.clone(),
        product_name: row.product_name.clone(),
        provider_price_cents: row.provider_price_cents,
        price_rivas_cents: row.unit_price_rivas_cents,
        price_san_jorge_cents: row.unit_price_san_jorge_cents,
        price_isla_cents: row.unit_price_isla_cents,
        order_created_at: now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        catalog_entry, file_db, memory_db, remove_db_files, row, seller, transfer_request,
    };
    use chrono::{NaiveDate, TimeZone};
    use dulce_core::{Branch, ValidationError};
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn seeded() -> (Database, Ledger) {
        let db = memory_db().await;
        db.sellers()
            .upsert(&seller("S1", "Ana", Branch::Rivas, 10.0))
            .await
            .unwrap();
        db.sellers()
            .upsert(&seller("T", "Tomas", Branch::Isla, 10.0))
            .await
            .unwrap();
        db.vendor_rows()
            .insert_batch(&[
                row("A", "S1", "P1", Some("2024-01-01"), 5, 10),
                row("B", "S1", "P1", Some("2024-01-05"), 3, 10),
            ])
            .await
            .unwrap();

        let ledger = db.ledger();
        (db, ledger)
    }

    fn new_order(seller_id: &str, y: i32, m: u32, d: u32) -> Option<TransferDestination> {
        Some(TransferDestination::NewOrder {
            seller_id: seller_id.to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d),
        })
    }

    async fn record_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM transfer_records")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_fifo_sale_scenario() {
        let (db, ledger) = seeded().await;

        let allocation = ledger.allocate_sale("S1", "P1", 70).await.unwrap();
        assert_eq!(allocation.allocated_units, 70);
        assert_eq!(allocation.entries[0].vendor_row_id, "A");
        assert_eq!(allocation.entries[0].units_taken, 50);
        assert_eq!(allocation.entries[1].vendor_row_id, "B");
        assert_eq!(allocation.entries[1].units_taken, 20);

        let a = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(a.remaining_units, Some(0));
        assert_eq!(a.remaining_packages, Some(0));
        assert_eq!(a.packages, 5);
        assert_eq!(a.version, 1);

        let b = db.vendor_rows().get_by_id("B").await.unwrap().unwrap();
        assert_eq!(b.remaining_units, Some(10));
        assert_eq!(b.remaining_packages, Some(1));
        assert_eq!(b.packages, 3);
    }

    #[tokio::test]
    async fn test_sale_shortfall_allocates_what_exists() {
        let (db, ledger) = seeded().await;

        let allocation = ledger.allocate_sale("S1", "P1", 100).await.unwrap();
        assert_eq!(allocation.allocated_units, 80);
        assert_eq!(allocation.shortfall_units(), 20);

        // A later sale finds nothing left
        let again = ledger.allocate_sale("S1", "P1", 5).await.unwrap();
        assert!(again.entries.is_empty());

        let b = db.vendor_rows().get_by_id("B").await.unwrap().unwrap();
        assert_eq!(b.remaining_units, Some(0));
    }

    #[tokio::test]
    async fn test_zero_quantity_sale_writes_nothing() {
        let (db, ledger) = seeded().await;

        let allocation = ledger.allocate_sale("S1", "P1", 0).await.unwrap();
        assert!(allocation.entries.is_empty());

        let a = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(a.version, 0);
    }

    // -------------------------------------------------------------------------
    // Transfers
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_transfer_to_new_order_scenario() {
        let (db, ledger) = seeded().await;

        let record = ledger
            .transfer_packages(&transfer_request("A", 4, new_order("T", 2024, 2, 1)))
            .await
            .unwrap();

        assert!(record.dest_row_was_new);
        assert_eq!(record.packages_moved, 4);
        assert_eq!(record.to_order_key, "T__2024-02-01");

        let origin = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(origin.packages, 1);
        assert_eq!(origin.remaining_packages, Some(1));
        assert_eq!(origin.remaining_units, Some(10));
        assert_eq!(origin.transfer_delta, -4);
        assert_eq!(origin.version, 1);

        let dest = db
            .vendor_rows()
            .get_by_id(&record.to_vendor_row_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dest.seller_id, "T");
        assert_eq!(dest.seller_name, "Tomas");
        assert_eq!(dest.branch, Branch::Isla);
        assert_eq!(dest.packages, 4);
        assert_eq!(dest.remaining_units, Some(40));
        assert_eq!(dest.line_total_cents, Some(14_000));
        assert_eq!(dest.vendor_commission_cents, Some(600));
        assert_eq!(dest.version, 0);

        let stored = db.transfers().get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(db.transfers().list_by_from_seller("S1").await.unwrap().len(), 1);
        assert_eq!(db.transfers().list_by_to_seller("T").await.unwrap().len(), 1);

        let window = chrono::Duration::seconds(5);
        let recent = db
            .transfers()
            .list_created_between(record.created_at - window, record.created_at + window)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_second_transfer_to_same_order_credits_row() {
        let (db, ledger) = seeded().await;

        let first = ledger
            .transfer_packages(&transfer_request("A", 2, new_order("T", 2024, 2, 1)))
            .await
            .unwrap();
        let second = ledger
            .transfer_packages(&transfer_request("B", 1, new_order("T", 2024, 2, 1)))
            .await
            .unwrap();

        assert!(!second.dest_row_was_new);
        assert_eq!(second.to_vendor_row_id, first.to_vendor_row_id);

        let dest = db
            .vendor_rows()
            .get_by_id(&first.to_vendor_row_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dest.packages, 3);
        assert_eq!(dest.remaining_units, Some(30));
        assert_eq!(dest.transfer_delta, 1);
        assert_eq!(db.vendor_rows().list_by_order("T__2024-02-01").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_into_existing_order_without_the_product() {
        let (db, ledger) = seeded().await;
        db.vendor_rows()
            .insert(&row("T1", "T", "P2", Some("2024-02-01"), 2, 6))
            .await
            .unwrap();

        let record = ledger
            .transfer_packages(&transfer_request(
                "A",
                2,
                Some(TransferDestination::ExistingOrder {
                    order_key: "T__2024-02-01".into(),
                }),
            ))
            .await
            .unwrap();

        assert!(record.dest_row_was_new);
        let order = db.vendor_rows().list_by_order("T__2024-02-01").await.unwrap();
        assert_eq!(order.len(), 2);
        let created = order.iter().find(|r| r.product_id == "P1").unwrap();
        assert_eq!(created.packages, 2);
        assert_eq!(created.seller_id, "T");
    }

    #[tokio::test]
    async fn test_rejected_transfers_change_nothing() {
        let (db, ledger) = seeded().await;

        let err = ledger
            .transfer_packages(&transfer_request("A", 6, new_order("T", 2024, 2, 1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ledger(),
            Some(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));

        let mut no_comment = transfer_request("A", 1, new_order("T", 2024, 2, 1));
        no_comment.comment = "  ".into();
        let err = ledger.transfer_packages(&no_comment).await.unwrap_err();
        assert_eq!(err.as_ledger(), Some(&CoreError::MissingComment));

        let err = ledger
            .transfer_packages(&transfer_request("A", 1, new_order("NOPE", 2024, 2, 1)))
            .await
            .unwrap_err();
        assert_eq!(err.as_ledger(), Some(&CoreError::SellerNotFound("NOPE".into())));

        let err = ledger
            .transfer_packages(&transfer_request(
                "A",
                1,
                Some(TransferDestination::ExistingOrder {
                    order_key: "T__1999-01-01".into(),
                }),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(CoreError::OrderNotFound(_))));

        let err = ledger
            .transfer_packages(&transfer_request("ZZ", 1, new_order("T", 2024, 2, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(CoreError::RowNotFound(_))));

        // Same seller, existing row
        let err = ledger
            .transfer_packages(&transfer_request(
                "A",
                1,
                Some(TransferDestination::ExistingRow { row_id: "B".into() }),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ledger(), Some(CoreError::SameSeller { .. })));

        let origin = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(origin.version, 0);
        assert_eq!(origin.remaining_packages, Some(5));
        assert_eq!(record_count(&db).await, 0);
        assert_eq!(db.vendor_rows().list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_same_seller_allowed_by_policy() {
        let (db, ledger) = seeded().await;
        let ledger = ledger.with_policy(TransferPolicy {
            allow_same_seller: true,
        });

        ledger
            .transfer_packages(&transfer_request(
                "A",
                2,
                Some(TransferDestination::ExistingRow { row_id: "B".into() }),
            ))
            .await
            .unwrap();

        let b = db.vendor_rows().get_by_id("B").await.unwrap().unwrap();
        assert_eq!(b.packages, 5);
    }

    #[tokio::test]
    async fn test_conflict_on_destination_rolls_back_origin() {
        let (db, _ledger) = seeded().await;
        db.vendor_rows()
            .insert(&row("D", "T", "P1", Some("2024-02-01"), 1, 10))
            .await
            .unwrap();

        // Plan from the current reads
        let origin = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        let dest = db.vendor_rows().get_by_id("D").await.unwrap().unwrap();
        let request = transfer_request(
            "A",
            2,
            Some(TransferDestination::ExistingRow { row_id: "D".into() }),
        );
        let plan = plan_transfer(
            &request,
            &origin,
            ResolvedDestination::Existing(dest.clone()),
            None,
            TransferPolicy::default(),
            Utc::now(),
        )
        .unwrap();

        // Someone else writes the destination first
        db.vendor_rows().update_versioned(&dest).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let err = apply_transfer_plan(&mut tx, &plan).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { ref id, .. } if id == "D"));
        tx.rollback().await.unwrap();

        let origin_after = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(origin_after, origin);
        assert_eq!(record_count(&db).await, 0);
    }

    // -------------------------------------------------------------------------
    // Retry and concurrency
    // -------------------------------------------------------------------------

    fn quick_retry(limit: u32) -> RetryPolicy {
        RetryPolicy {
            limit,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_lost_races() {
        let ledger = memory_db().await.ledger().with_retry_policy(quick_retry(3));
        let calls = AtomicU32::new(0);

        let result = ledger
            .with_retry("test", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match call {
                        0 => Err(DbError::conflict("VendorOrderRow", "A")),
                        1 => Err(DbError::Busy("database is locked".into())),
                        _ => Ok(call),
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_limit() {
        let ledger = memory_db().await.ledger().with_retry_policy(quick_retry(2));
        let calls = AtomicU32::new(0);

        let err = ledger
            .with_retry("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DbError::conflict("VendorOrderRow", "A")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Conflict { .. }));
        // First attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rule_violations_are_not_retried() {
        let ledger = memory_db().await.ledger().with_retry_policy(quick_retry(3));
        let calls = AtomicU32::new(0);

        let err = ledger
            .with_retry("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DbError::Ledger(CoreError::MissingComment)) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.as_ledger(), Some(&CoreError::MissingComment));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_and_transfers_on_file_database() {
        let (db, path) = file_db(8).await;
        db.sellers()
            .upsert(&seller("S1", "Ana", Branch::Rivas, 10.0))
            .await
            .unwrap();
        db.sellers()
            .upsert(&seller("T", "Tomas", Branch::Isla, 10.0))
            .await
            .unwrap();
        db.vendor_rows()
            .insert_batch(&[
                row("A", "S1", "P1", Some("2024-01-01"), 8, 10),
                row("C", "S1", "P2", Some("2024-01-01"), 5, 6),
            ])
            .await
            .unwrap();

        let ledger = db.ledger();

        let sales: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.allocate_sale("S1", "P1", 5).await })
            })
            .collect();
        let transfers: Vec<_> = (0..5)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .transfer_packages(&transfer_request("C", 1, new_order("T", 2024, 2, 1)))
                        .await
                })
            })
            .collect();

        for sale in sales {
            let allocation = sale.await.unwrap().unwrap();
            assert_eq!(allocation.allocated_units, 5);
        }
        for transfer in transfers {
            let record = transfer.await.unwrap().unwrap();
            assert_eq!(record.packages_moved, 1);
        }

        // 80 units less eight sales of 5
        let a = db.vendor_rows().get_by_id("A").await.unwrap().unwrap();
        assert_eq!(a.remaining_units, Some(40));
        assert_eq!(a.version, 8);

        let c = db.vendor_rows().get_by_id("C").await.unwrap().unwrap();
        assert_eq!(c.packages, 0);
        assert_eq!(c.remaining_packages, Some(0));

        let dest = db.vendor_rows().list_by_order("T__2024-02-01").await.unwrap();
        assert_eq!(dest.len(), 1);
        assert_eq!(dest[0].packages, 5);
        assert_eq!(dest[0].remaining_units, Some(30));
        assert_eq!(record_count(&db).await, 5);

        db.close().await;
        remove_db_files(&path);
    }

    // -------------------------------------------------------------------------
    // Issuance and reports
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_issue_order_validates_and_prices() {
        let db = memory_db().await;
        let ledger = db.ledger();

        let mut bad = row("X2", "S1", "P1", Some("2024-03-01"), 2, 10);
        bad.units_per_package = 0;
        let err = ledger
            .issue_order(&[row("X1", "S1", "P1", Some("2024-03-01"), 2, 10), bad])
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ledger(),
            Some(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert!(db.vendor_rows().list_all().await.unwrap().is_empty());

        ledger
            .issue_order(&[
                row("X1", "S1", "P1", Some("2024-03-01"), 2, 10),
                row("X2", "S1", "P2", Some("2024-03-01"), 4, 6),
            ])
            .await
            .unwrap();

        assert_eq!(db.vendor_rows().list_all().await.unwrap().len(), 2);
        assert_eq!(db.catalog().load_catalog().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_row_financials_follow_latest_catalog() {
        let (db, ledger) = seeded().await;

        let figures = ledger.row_financials("A").await.unwrap();
        assert_eq!(figures.line_total_expected.cents(), 15_000);
        assert_eq!(figures.gross_profit.cents(), 5_000);
        assert_eq!(figures.vendor_share.cents(), 500);
        assert_eq!(figures.investor_share.cents(), 4_500);

        let march = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        db.catalog()
            .insert(&catalog_entry("c1", "P1", 4000, march))
            .await
            .unwrap();

        let figures = ledger.row_financials("A").await.unwrap();
        assert_eq!(figures.price_per_package.cents(), 4000);
        assert_eq!(figures.line_total_expected.cents(), 20_000);
        assert_eq!(figures.vendor_share.cents(), 1_000);

        let err = ledger.row_financials("nope").await.unwrap_err();
        assert!(matches!(err.as_ledger(), Some(CoreError::RowNotFound(_))));
    }

    #[tokio::test]
    async fn test_order_summaries() {
        let (_db, ledger) = seeded().await;
        ledger.allocate_sale("S1", "P1", 25).await.unwrap();

        let summaries = ledger.order_summaries().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].order_key, "S1__2024-01-01");
        assert_eq!(summaries[1].order_key, "S1__2024-01-05");

        let first = &summaries[0];
        assert_eq!(first.total_expected.cents(), 15_000);
        // 25 of 50 units sold
        assert_eq!(first.sold.cents(), 7_500);
        assert_eq!(first.remaining.cents(), 7_500);
        assert_eq!(first.commission.cents(), 500);
        assert_eq!(first.net_expected.cents(), 14_500);

        // Reports are repeatable
        assert_eq!(ledger.order_summaries().await.unwrap(), summaries);

        let one = ledger.order_summary("S1__2024-01-05").await.unwrap();
        assert_eq!(one, summaries[1]);

        let err = ledger.order_summary("S9__2024-01-01").await.unwrap_err();
        assert!(matches!(err.as_ledger(), Some(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_summaries_for_unknown_seller_use_zero_commission() {
        let (db, ledger) = seeded().await;
        db.vendor_rows()
            .insert(&row("G", "GHOST", "P1", Some("2024-01-03"), 2, 10))
            .await
            .unwrap();

        let summary = ledger.order_summary("GHOST__2024-01-03").await.unwrap();
        assert_eq!(summary.total_expected.cents(), 6_000);
        assert!(summary.commission.is_zero());
        assert_eq!(summary.net_expected, summary.total_expected);

        let summaries = ledger.order_summaries().await.unwrap();
        assert_eq!(summaries.len(), 3);
    }
}
