//! # Vendor Order Row Repository
//!
//! Database operations for the ledger lines.
//!
//! ## Versioned Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read  row A (version 7)                                               │
//! │    │                                                                    │
//! │    ▼  plan in dulce-core                                               │
//! │  UPDATE vendor_order_rows SET ..., version = version + 1               │
//! │   WHERE id = 'A' AND version = 7                                       │
//! │    │                                                                    │
//! │    ├── 1 row  ──► ok, row A is now version 8                           │
//! │    └── 0 rows ──► DbError::Conflict (someone wrote A since the read)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method exists in two forms: on the repository (own pool
//! connection) and as an associated `*_in` function over a borrowed
//! connection, so the ledger can run several of them in one transaction.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use dulce_core::VendorOrderRow;

/// Repository for vendor order rows.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.vendor_rows();
/// let rows = repo.list_for_seller_product("S1", "P1").await?;
/// ```
#[derive(Debug, Clone)]
pub struct VendorRowRepository {
    pool: SqlitePool,
}

impl VendorRowRepository {
    /// Creates a new VendorRowRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VendorRowRepository { pool }
    }

    // =========================================================================
    // Pool-backed API
    // =========================================================================

    /// Gets a row by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<VendorOrderRow>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    /// All rows of one order, oldest first.
    pub async fn list_by_order(&self, order_key: &str) -> DbResult<Vec<VendorOrderRow>> {
        let mut conn = self.pool.acquire().await?;
        Self::list_by_order_in(&mut conn, order_key).await
    }

    /// All rows of one seller and product (any stock level).
    pub async fn list_for_seller_product(
        &self,
        seller_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<VendorOrderRow>> {
        let mut conn = self.pool.acquire().await?;
        Self::list_for_seller_product_in(&mut conn, seller_id, product_id).await
    }

    /// The row of `order_key` holding `product_id`, if any.
    pub async fn find_in_order(
        &self,
        order_key: &str,
        product_id: &str,
    ) -> DbResult<Option<VendorOrderRow>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_in_order_in(&mut conn, order_key, product_id).await
    }

    /// Every row in the ledger, ordered by order key.
    pub async fn list_all(&self) -> DbResult<Vec<VendorOrderRow>> {
        let rows = sqlx::query_as::<_, VendorOrderRow>(
            "SELECT * FROM vendor_order_rows ORDER BY order_key, created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts one row.
    pub async fn insert(&self, row: &VendorOrderRow) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, row).await
    }

    /// Inserts a batch of rows in one transaction.
    pub async fn insert_batch(&self, rows: &[VendorOrderRow]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            Self::insert_in(&mut tx, row).await?;
        }
        tx.commit().await?;

        debug!(count = rows.len(), "Inserted vendor row batch");
        Ok(())
    }

    /// Writes the mutable counters of `row`, conditioned on `row.version`.
    /// Returns the new version.
    pub async fn update_versioned(&self, row: &VendorOrderRow) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Self::update_versioned_in(&mut conn, row).await
    }

    // =========================================================================
    // Connection-scoped API (used inside ledger transactions)
    // =========================================================================

    pub async fn get_by_id_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<VendorOrderRow>> {
        let row = sqlx::query_as::<_, VendorOrderRow>(
            "SELECT * FROM vendor_order_rows WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    pub async fn list_by_order_in(
        conn: &mut SqliteConnection,
        order_key: &str,
    ) -> DbResult<Vec<VendorOrderRow>> {
        let rows = sqlx::query_as::<_, VendorOrderRow>(
            "SELECT * FROM vendor_order_rows WHERE order_key = ?1 ORDER BY created_at, id",
        )
        .bind(order_key)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    pub async fn list_for_seller_product_in(
        conn: &mut SqliteConnection,
        seller_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<VendorOrderRow>> {
        let rows = sqlx::query_as::<_, VendorOrderRow>(
            r#"
            SELECT * FROM vendor_order_rows
            WHERE seller_id = ?1 AND product_id = ?2
            ORDER BY date IS NULL, date, created_at, id
            "#,
        )
        .bind(seller_id)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    pub async fn find_in_order_in(
        conn: &mut SqliteConnection,
        order_key: &str,
        product_id: &str,
    ) -> DbResult<Option<VendorOrderRow>> {
        // Oldest first if an order ever holds the product twice
        let row = sqlx::query_as::<_, VendorOrderRow>(
            r#"
            SELECT * FROM vendor_order_rows
            WHERE order_key = ?1 AND product_id = ?2
            ORDER BY created_at, id
            LIMIT 1
            "#,
        )
        .bind(order_key)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    pub async fn insert_in(conn: &mut SqliteConnection, row: &VendorOrderRow) -> DbResult<()> {
        debug!(id = %row.id, order_key = %row.order_key, product_id = %row.product_id, "Inserting vendor row");

        sqlx::query(
            r#"
            INSERT INTO vendor_order_rows (
                id, order_key, order_id, date,
                seller_id, seller_name, product_id, product_name, category, branch,
                units_per_package, packages, remaining_packages, remaining_units,
                provider_price_cents, unit_price_rivas_cents,
                unit_price_san_jorge_cents, unit_price_isla_cents,
                total_units, line_total_cents, unit_price_vendor_cents,
                gross_profit_cents, vendor_commission_cents,
                transfer_delta, created_at, updated_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16,
                ?17, ?18,
                ?19, ?20, ?21,
                ?22, ?23,
                ?24, ?25, ?26, ?27
            )
            "#,
        )
        .bind(&row.id)
        .bind(&row.order_key)
        .bind(&row.order_id)
        .bind(row.date)
        .bind(&row.seller_id)
        .bind(&row.seller_name)
        .bind(&row.product_id)
        .bind(&row.product_name)
        .bind(&row.category)
        .bind(row.branch)
        .bind(row.units_per_package)
        .bind(row.packages)
        .bind(row.remaining_packages)
        .bind(row.remaining_units)
        .bind(row.provider_price_cents)
        .bind(row.unit_price_rivas_cents)
        .bind(row.unit_price_san_jorge_cents)
        .bind(row.unit_price_isla_cents)
        .bind(row.total_units)
        .bind(row.line_total_cents)
        .bind(row.unit_price_vendor_cents)
        .bind(row.gross_profit_cents)
        .bind(row.vendor_commission_cents)
        .bind(row.transfer_delta)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes packages, both remaining counters, `transfer_delta` and
    /// `updated_at`. Everything else on a row is immutable after issue.
    pub async fn update_versioned_in(
        conn: &mut SqliteConnection,
        row: &VendorOrderRow,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            UPDATE vendor_order_rows SET
                packages = ?3,
                remaining_packages = ?4,
                remaining_units = ?5,
                transfer_delta = ?6,
                updated_at = ?7,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&row.id)
        .bind(row.version)
        .bind(row.packages)
        .bind(row.remaining_packages)
        .bind(row.remaining_units)
        .bind(row.transfer_delta)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            debug!(id = %row.id, version = row.version, "Versioned update lost the race");
            return Err(DbError::conflict("VendorOrderRow", &row.id));
        }

        Ok(row.version + 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
