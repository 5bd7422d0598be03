//! # Seller Repository
//!
//! The seller directory: names, home branch and commission percentage.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use dulce_core::Seller;

/// Repository for the seller directory.
#[derive(Debug, Clone)]
pub struct SellerRepository {
    pool: SqlitePool,
}

impl SellerRepository {
    /// Creates a new SellerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SellerRepository { pool }
    }

    /// Gets a seller by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Seller>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_by_id_in(&mut conn, id).await
    }

    /// All sellers, by name.
    pub async fn list(&self) -> DbResult<Vec<Seller>> {
        let mut conn = self.pool.acquire().await?;
        Self::list_in(&mut conn).await
    }

    /// Inserts a seller or replaces the existing entry with the same ID.
    pub async fn upsert(&self, seller: &Seller) -> DbResult<()> {
        debug!(id = %seller.id, name = %seller.name, "Upserting seller");

        sqlx::query(
            r#"
            INSERT INTO sellers (id, name, branch, commission_percent)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                branch = excluded.branch,
                commission_percent = excluded.commission_percent
            "#,
        )
        .bind(&seller.id)
        .bind(&seller.name)
        .bind(seller.branch)
        .bind(seller.commission_percent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(seller)
    }

    pub async fn list_in(conn: &mut SqliteConnection) -> DbResult<Vec<Seller>> {
        let sellers = sqlx::query_as::<_, Seller>("SELECT * FROM sellers ORDER BY name, id")
            .fetch_all(&mut *conn)
            .await?;

        Ok(sellers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, seller};
    use dulce_core::Branch;

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = memory_db().await;
        let repo = db.sellers();

        repo.upsert(&seller("S1", "Ana", Branch::Rivas, 10.0)).await.unwrap();
        repo.upsert(&seller("S1", "Ana María", Branch::Isla, 12.5)).await.unwrap();
        repo.upsert(&seller("S2", "Beto", Branch::SanJorge, 8.0)).await.unwrap();

        let ana = repo.get_by_id("S1").await.unwrap().unwrap();
        assert_eq!(ana.name, "Ana María");
        assert_eq!(ana.branch, Branch::Isla);
        assert_eq!(ana.commission_rate().bps(), 1250);

        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert!(repo.get_by_id("S9").await.unwrap().is_none());
    }
}
