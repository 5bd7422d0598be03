//! # Transfer Record Repository
//!
//! Append-only audit log of package transfers. Records are written once, by
//! the ledger, inside the transaction that moves the packages; there is no
//! update or delete.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use dulce_core::TransferRecord;

/// Repository for transfer records.
#[derive(Debug, Clone)]
pub struct TransferRecordRepository {
    pool: SqlitePool,
}

impl TransferRecordRepository {
    /// Creates a new TransferRecordRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransferRecordRepository { pool }
    }

    /// Appends a record.
    pub async fn insert(&self, record: &TransferRecord) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, record).await
    }

    /// Gets a record by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TransferRecord>> {
        let record = sqlx::query_as::<_, TransferRecord>(
            "SELECT * FROM transfer_records WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Transfers out of a seller, newest first.
    pub async fn list_by_from_seller(&self, seller_id: &str) -> DbResult<Vec<TransferRecord>> {
        let records = sqlx::query_as::<_, TransferRecord>(
            "SELECT * FROM transfer_records WHERE from_seller_id = ?1 ORDER BY created_at DESC, id",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Transfers into a seller, newest first.
    pub async fn list_by_to_seller(&self, seller_id: &str) -> DbResult<Vec<TransferRecord>> {
        let records = sqlx::query_as::<_, TransferRecord>(
            "SELECT * FROM transfer_records WHERE to_seller_id = ?1 ORDER BY created_at DESC, id",
        )
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Records with `from <= created_at < to`, oldest first.
    pub async fn list_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<TransferRecord>> {
        let records = sqlx::query_as::<_, TransferRecord>(
            r#"
            SELECT * FROM transfer_records
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at, id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn insert_in(conn: &mut SqliteConnection, record: &TransferRecord) -> DbResult<()> {
        debug!(
            id = %record.id,
            from = %record.from_vendor_row_id,
            to = %record.to_vendor_row_id,
            packages = record.packages_moved,
            "Appending transfer record"
        );

        sqlx::query(
            r#"
            INSERT INTO transfer_records (
                id, created_at, date,
                created_by_email, created_by_name,
                product_id, product_name, provider_price_cents,
                unit_price_rivas_cents, unit_price_san_jorge_cents, unit_price_isla_cents,
                packages_moved,
                from_seller_id, from_seller_name, from_order_key, from_vendor_row_id,
                to_seller_id, to_seller_name, to_order_key, to_vendor_row_id,
                comment, dest_row_was_new
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12,
                ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20,
                ?21, ?22
            )
            "#,
        )
        .bind(&record.id)
        .bind(record.created_at)
        .bind(record.date)
        .bind(&record.created_by_email)
        .bind(&record.created_by_name)
        .bind(&record.product_id)
        .bind(&record.product_name)
        .bind(record.provider_price_cents)
        .bind(record.unit_price_rivas_cents)
        .bind(record.unit_price_san_jorge_cents)
        .bind(record.unit_price_isla_cents)
        .bind(record.packages_moved)
        .bind(&record.from_seller_id)
        .bind(&record.from_seller_name)
        .bind(&record.from_order_key)
        .bind(&record.from_vendor_row_id)
        .bind(&record.to_seller_id)
        .bind(&record.to_seller_name)
        .bind(&record.to_order_key)
        .bind(&record.to_vendor_row_id)
        .bind(&record.comment)
        .bind(record.dest_row_was_new)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
