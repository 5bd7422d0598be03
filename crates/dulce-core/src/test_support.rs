//! Fixtures shared by the unit tests of this crate.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::types::{order_key, Branch, CatalogEntry, VendorOrderRow};

/// Midnight UTC of the given day.
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// A fully stocked row of seller `S1` / product `P1` at Rivas.
///
/// Prices per package: provider 20.00, Rivas 30.00, San Jorge 32.00,
/// Isla 35.00.
pub fn row(id: &str, date: &str, packages: i64, units_per_package: i64) -> VendorOrderRow {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let created = at(2024, 1, 1);

    VendorOrderRow {
        id: id.to_string(),
        order_key: order_key("S1", Some(date), None),
        order_id: None,
        date: Some(date),
        seller_id: "S1".to_string(),
        seller_name: "Ana".to_string(),
        product_id: "P1".to_string(),
        product_name: "Cajeta de leche".to_string(),
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

/// A catalog entry for `product_id` with the given Rivas price; the other
/// branches are priced higher.
pub fn catalog_entry(
    product_id: &str,
    price_rivas_cents: i64,
    order_created_at: DateTime<Utc>,
) -> CatalogEntry {
    CatalogEntry {
        id: format!("cat-{}-{}", product_id, order_created_at.timestamp()),
        product_id: product_id.to_string(),
        product_name: "Cajeta de leche".to_string(),
        provider_price_cents: 2000,
        price_rivas_cents,
        price_san_jorge_cents: price_rivas_cents + 200,
        price_isla_cents: price_rivas_cents + 500,
        order_created_at,
    }
}
