//! Fixtures shared by the database tests.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use dulce_core::transfer::{TransferDestination, TransferRequest};
use dulce_core::{order_key, Actor, Branch, CatalogEntry, Seller, VendorOrderRow};

use crate::pool::{Database, DbConfig};

/// A fresh, migrated in-memory database.
pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A fresh ledger file under the temp dir, for tests that need several
/// connections writing at once. Clean up with [`remove_db_files`].
pub async fn file_db(max_connections: u32) -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("dulce-{}.db", Uuid::new_v4()));
    let db = Database::new(DbConfig::new(&path).max_connections(max_connections))
        .await
        .unwrap();
    (db, path)
}

/// Removes a ledger file with its WAL companions.
pub fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

/// A fully stocked Rivas row. Prices per package: provider 20.00,
/// Rivas 30.00, San Jorge 32.00, Isla 35.00.
pub fn row(
    id: &str,
    seller_id: &str,
    product_id: &str,
    date: Option<&str>,
    packages: i64,
    units_per_package: i64,
) -> VendorOrderRow {
    let date = date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap());
    let order_id = format!("ord-{id}");
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    VendorOrderRow {
        id: id.to_string(),
        order_key: order_key(seller_id, date, Some(&order_id)),
        order_id: Some(order_id),
        date,
        seller_id: seller_id.to_string(),
        seller_name: format!("Seller {seller_id}"),
        product_id: product_id.to_string(),
        product_name: format!("Product {product_id}"),
        category: "Dulces".to_string(),
        branch: Branch::Rivas,
        units_per_package,
        packages,
        remaining_packages: Some(packages),
        remaining_units: Some(packages * units_per_package),
        provider_price_cents: 2000,
        unit_price_rivas_cents: 3000,
        unit_price_san_jorge_cents: 3200,
        unit_price_isla_cents: 3500,
        total_units: None,
        line_total_cents: None,
        unit_price_vendor_cents: None,
        gross_profit_cents: None,
        vendor_commission_cents: None,
        transfer_delta: 0,
        created_at: created,
        updated_at: created,
        version: 0,
    }
}

pub fn seller(id: &str, name: &str, branch: Branch, commission_percent: f64) -> Seller {
    Seller {
        id: id.to_string(),
        name: name.to_string(),
        branch,
        commission_percent,
    }
}

pub fn catalog_entry(
    id: &str,
    product_id: &str,
    price_rivas_cents: i64,
    order_created_at: DateTime<Utc>,
) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        product_id: product_id.to_string(),
        product_name: format!("Product {product_id}"),
        provider_price_cents: 2000,
        price_rivas_cents,
        price_san_jorge_cents: price_rivas_cents + 200,
        price_isla_cents: price_rivas_cents + 500,
        order_created_at,
    }
}

pub fn transfer_request(
    origin_row_id: &str,
    packages: i64,
    destination: Option<TransferDestination>,
) -> TransferRequest {
    TransferRequest {
        origin_row_id: origin_row_id.to_string(),
        packages,
        comment: "Moving stock to the busier branch".to_string(),
        destination,
        actor: Actor::new("ops@dulce.example", "Ops"),
    }
}
