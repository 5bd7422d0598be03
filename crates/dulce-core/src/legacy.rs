//! # Legacy Row Import
//!
//! Decodes vendor order rows exported from the old document store.
//!
//! Those documents are camelCase, and every numeric field may arrive as a
//! number, a numeric string, `null`, or garbage. Prices are decimal currency
//! amounts (`30.5` means C$30.50). Decoding never fails on a bad field: it
//! is coerced to zero or absent. A document is only rejected when it lacks
//! an identity (`id`, `sellerId`, `productId`).
//!
//! ```text
//! { "id": "r1", "sellerId": "S1", "unitsPerPackage": "12",
//!   "remainingUnits": null, "unitPriceIsla": 35.5, ... }
//!          │
//!          ▼  LegacyRowDocument (lenient serde)
//!          │
//!          ▼  into_row()
//! VendorOrderRow { units_per_package: 12, remaining_units: None,
//!                  unit_price_isla_cents: 3550, version: 0, ... }
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{order_key, Branch, VendorOrderRow};

/// One row as stored by the document store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyRowDocument {
    #[serde(deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub order_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub date: Option<String>,

    #[serde(deserialize_with = "lenient_text")]
    pub seller_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub seller_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub product_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub product_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub branch: Option<String>,

    #[serde(deserialize_with = "lenient_count")]
    pub units_per_package: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub packages: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub remaining_packages: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub remaining_units: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub total_units: Option<i64>,
    #[serde(deserialize_with = "lenient_count")]
    pub transfer_delta: Option<i64>,

    #[serde(deserialize_with = "lenient_cents")]
    pub provider_price: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub unit_price_rivas: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub unit_price_san_jorge: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub unit_price_isla: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub line_total: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub unit_price_vendor: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub gross_profit: Option<i64>,
    #[serde(deserialize_with = "lenient_cents")]
    pub vendor_commission: Option<i64>,
}

impl LegacyRowDocument {
    /// Converts into a ledger row, stamping `now` as both timestamps.
    ///
    /// Unparseable dates become `None` (drawn last by FIFO); unknown branches
    /// fall back to [`Branch::default`].
    pub fn into_row(self, now: DateTime<Utc>) -> CoreResult<VendorOrderRow> {
        let id = required("id", self.id)?;
        let seller_id = required("seller_id", self.seller_id)?;
        let product_id = required("product_id", self.product_id)?;

        let date = self.date.as_deref().and_then(parse_legacy_date);
        let branch = self
            .branch
            .as_deref()
            .and_then(|b| b.parse::<Branch>().ok())
            .unwrap_or_default();

        Ok(VendorOrderRow {
            order_key: order_key(&seller_id, date, self.order_id.as_deref()),
            id,
            order_id: self.order_id,
            date,
            seller_name: self.seller_name.unwrap_or_default(),
            seller_id,
            product_name: self.product_name.unwrap_or_default(),
            product_id,
            category: self.category.unwrap_or_default(),
            branch,
            units_per_package: self.units_per_package.unwrap_or(0).max(0),
            packages: self.packages.unwrap_or(0),
            remaining_packages: self.remaining_packages,
            remaining_units: self.remaining_units,
            provider_price_cents: self.provider_price.unwrap_or(0),
            unit_price_rivas_cents: self.unit_price_rivas.unwrap_or(0),
            unit_price_san_jorge_cents: self.unit_price_san_jorge.unwrap_or(0),
            unit_price_isla_cents: self.unit_price_isla.unwrap_or(0),
            total_units: self.total_units,
            line_total_cents: self.line_total,
            unit_price_vendor_cents: self.unit_price_vendor,
            gross_profit_cents: self.gross_profit,
            vendor_commission_cents: self.vendor_commission,
            transfer_delta: self.transfer_delta.unwrap_or(0),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }
}

/// Outcome of importing a legacy export.
#[derive(Debug, Default)]
pub struct LegacyImport {
    pub rows: Vec<VendorOrderRow>,
    /// Position in the export and the reason, for documents that were skipped.
    pub rejected: Vec<(usize, CoreError)>,
}

/// Parses a legacy export: either a JSON array of documents or an object
/// keyed by document id (the id key fills a missing `id` field).
///
/// Only malformed JSON is an error. Documents without identity are reported
/// in [`LegacyImport::rejected`].
pub fn parse_legacy_rows(json: &str, now: DateTime<Utc>) -> Result<LegacyImport, serde_json::Error> {
    let value: Value = serde_json::from_str(json)?;

    let documents: Vec<LegacyRowDocument> = match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, doc)| {
                let mut doc = LegacyRowDocument::deserialize(doc)?;
                if doc.id.is_none() {
                    doc.id = Some(key);
                }
                Ok(doc)
            })
            .collect::<Result<_, serde_json::Error>>()?,
        other => Vec::<LegacyRowDocument>::deserialize(other)?,
    };

    let mut import = LegacyImport::default();
    for (index, doc) in documents.into_iter().enumerate() {
        match doc.into_row(now) {
            Ok(row) => import.rows.push(row),
            Err(err) => import.rejected.push((index, err)),
        }
    }

    Ok(import)
}

fn required(field: &str, value: Option<String>) -> CoreResult<String> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        CoreError::Validation(ValidationError::Required {
            field: field.to_string(),
        })
    })
}

/// Accepts `YYYY-MM-DD` or anything starting with it (ISO timestamps).
fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

// =============================================================================
// Lenient Field Decoders
// =============================================================================

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Largest package or unit count accepted from a legacy document.
const MAX_LEGACY_COUNT: f64 = 1_000_000_000.0;

/// Largest amount accepted from a legacy document: C$1,000,000,000.00.
const MAX_LEGACY_CENTS: f64 = 100_000_000_000.0;

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_number(&value).map(|n| n.trunc().clamp(-MAX_LEGACY_COUNT, MAX_LEGACY_COUNT) as i64))
}

fn lenient_cents<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_number(&value)
        .map(|n| (n * 100.0).round().clamp(-MAX_LEGACY_CENTS, MAX_LEGACY_CENTS) as i64))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
