//! # Seed Data Generator
//!
//! Populates a ledger database for development.
//!
//! ## Usage
//! ```bash
//! # Sellers, catalog and vendor orders across the three branches
//! cargo run -p dulce-db --bin seed
//!
//! # Specify database path (default: DULCE_DATABASE_PATH or ./dulce.db)
//! cargo run -p dulce-db --bin seed -- --db ./data/dulce.db
//!
//! # Import rows exported from the old document store
//! cargo run -p dulce-db --bin seed -- --legacy ./export/vendor_rows.json
//! ```
//!
//! ## Generated Data
//! - One seller per branch, with commissions between 8% and 12%
//! - Two weekly orders per seller, one row per candy product
//! - A catalog entry per product and order

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use dulce_core::legacy::parse_legacy_rows;
use dulce_core::{order_key, Branch, Seller, VendorOrderRow};
use dulce_db::{Database, LedgerConfig};

/// (id, name, branch, commission %)
const SELLERS: &[(&str, &str, Branch, f64)] = &[
    ("ana", "Ana Ruiz", Branch::Rivas, 10.0),
    ("beto", "Beto Lacayo", Branch::SanJorge, 8.0),
    ("carla", "Carla Ometepe", Branch::Isla, 12.0),
];

/// (id, name, units per package, provider price, Rivas price) in cents.
/// San Jorge and Isla charge 5% and 15% more than Rivas.
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("cajeta-leche", "Cajeta de leche", 12, 3_600, 5_400),
    ("cajeta-coco", "Cajeta de coco", 12, 3_000, 4_800),
    ("rosquillas", "Rosquillas somoteñas", 20, 4_000, 6_000),
    ("cosa-horno", "Cosa de horno", 10, 2_500, 3_900),
    ("espumillas", "Espumillas", 24, 1_800, 3_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = LedgerConfig::load()?;
    let args: Vec<String> = env::args().collect();

    let mut db_path = config.database_path.clone();
    let mut legacy_file: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--legacy" | "-l" => {
                if i + 1 < args.len() {
                    legacy_file = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Dulce Ledger Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (default: ./dulce.db)");
                println!("  -l, --legacy <FILE>    Import a legacy JSON export instead");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let shown_path = db_path.display().to_string();
    let db_config = LedgerConfig {
        database_path: db_path,
        ..config
    }
    .db_config();
    let db = Database::new(db_config).await?;
    info!(path = %shown_path, "Connected, migrations applied");

    match legacy_file {
        Some(path) => import_legacy(&db, &path).await?,
        None => seed_demo(&db).await?,
    }

    let summaries = db.ledger().order_summaries().await?;
    info!(orders = summaries.len(), "Seed complete");
    for summary in &summaries {
        info!(
            order = %summary.order_key,
            expected = %summary.total_expected,
            gross_profit = %summary.gross_profit,
            commission = %summary.commission,
            "Order"
        );
    }

    db.close().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dulce=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn seed_demo(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let existing = db.vendor_rows().list_all().await?;
    if !existing.is_empty() {
        warn!(rows = existing.len(), "Database already has vendor rows, skipping seed");
        return Ok(());
    }

    for (id, name, branch, commission_percent) in SELLERS {
        db.sellers()
            .upsert(&Seller {
                id: id.to_string(),
                name: name.to_string(),
                branch: *branch,
                commission_percent: *commission_percent,
            })
            .await?;
    }
    info!(sellers = SELLERS.len(), "Seller directory seeded");

    let first_week = NaiveDate::from_ymd_opt(2024, 1, 8).ok_or("invalid seed date")?;
    let ledger = db.ledger();

    for (seller_idx, (seller_id, seller_name, branch, _)) in SELLERS.iter().enumerate() {
        for week in 0..2i64 {
            let date = first_week + Duration::weeks(week);
            let rows: Vec<VendorOrderRow> = PRODUCTS
                .iter()
                .enumerate()
                .map(|(product_idx, product)| {
                    let packages = 2 + ((seller_idx + product_idx) as i64 + week) % 5;
                    demo_row(seller_id, seller_name, *branch, date, product, packages)
                })
                .collect();

            ledger.issue_order(&rows).await?;
            info!(seller = seller_id, %date, rows = rows.len(), "Order issued");
        }
    }

    Ok(())
}

fn demo_row(
    seller_id: &str,
    seller_name: &str,
    branch: Branch,
    date: NaiveDate,
    product: &(&str, &str, i64, i64, i64),
    packages: i64,
) -> VendorOrderRow {
    let (product_id, product_name, units_per_package, provider, rivas) = *product;
    let now = Utc::now();

    VendorOrderRow {
        id: Uuid::new_v4().to_string(),
        order_key: order_key(seller_id, Some(date), None),
        order_id: None,
        date: Some(date),
        seller_id: seller_id.to_string(),
        seller_name: seller_name.to_string(),
        product_id: product_id.to_string(),
        product_name: product_name.to_string(),
        category: "Dulces típicos".to_string(),
        branch,
        units_per_package,
        packages,
        remaining_packages: Some(packages),
        remaining_units: Some(packages * units_per_package),
        provider_price_cents: provider,
        unit_price_rivas_cents: rivas,
        unit_price_san_jorge_cents: rivas * 105 / 100,
        unit_price_isla_cents: rivas * 115 / 100,
        total_units: None,
        line_total_cents: None,
        unit_price_vendor_cents: None,
        gross_profit_cents: None,
        vendor_commission_cents: None,
        transfer_delta: 0,
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

async fn import_legacy(db: &Database, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    let import = parse_legacy_rows(&json, Utc::now())?;

    for (index, reason) in &import.rejected {
        warn!(index, %reason, "Skipping legacy document");
    }

    db.vendor_rows().insert_batch(&import.rows).await?;
    info!(
        path = %path.display(),
        imported = import.rows.len(),
        rejected = import.rejected.len(),
        "Legacy rows imported"
    );

    Ok(())
}
