//! # Price Catalog Repository
//!
//! Branch price lists, one entry per issued order and product. The entry
//! with the latest `order_created_at` is the current price of a product.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use dulce_core::finance::PriceCatalog;
use dulce_core::CatalogEntry;

/// Repository for the price catalog.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Adds a catalog entry.
    pub async fn insert(&self, entry: &CatalogEntry) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_in(&mut conn, entry).await
    }

    /// The current entry of a product.
    pub async fn latest_for_product(&self, product_id: &str) -> DbResult<Option<CatalogEntry>> {
        let mut conn = self.pool.acquire().await?;
        Self::latest_for_product_in(&mut conn, product_id).await
    }

    /// Loads the current entry of every product.
    pub async fn load_catalog(&self) -> DbResult<PriceCatalog> {
        let entries = sqlx::query_as::<_, CatalogEntry>("SELECT * FROM price_catalog")
            .fetch_all(&self.pool)
            .await?;

        Ok(PriceCatalog::from_entries(entries))
    }

    pub async fn insert_in(conn: &mut SqliteConnection, entry: &CatalogEntry) -> DbResult<()> {
        debug!(id = %entry.id, product_id = %entry.product_id, "Inserting catalog entry");

        sqlx::query(
            r#"
            INSERT INTO price_catalog (
                id, product_id, product_name, provider_price_cents,
                price_rivas_cents, price_san_jorge_cents, price_isla_cents,
                order_created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(&entry.product_name)
        .bind(entry.provider_price_cents)
        .bind(entry.price_rivas_cents)
        .bind(entry.price_san_jorge_cents)
        .bind(entry.price_isla_cents)
        .bind(entry.order_created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn latest_for_product_in(
        conn: &mut SqliteConnection,
        product_id: &str,
    ) -> DbResult<Option<CatalogEntry>> {
        let entry = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM price_catalog
            WHERE product_id = ?1
            ORDER BY order_created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(entry)
    }
}
