//! # Validation Module
//!
//! Input validation for ledger mutations.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI form (out of tree)                                        │
//! │  └── Immediate feedback                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Called by the transfer planner before any state is computed       │
//! │  └── Called by dulce-db before a vendor order batch is inserted        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── version-checked UPDATEs                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::VendorOrderRow;
use crate::MAX_COMMENT_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identifier (row, seller, product, order key).
///
/// ```rust
/// use dulce_core::validation::validate_id;
///
/// assert!(validate_id("seller_id", "S-01").is_ok());
/// assert!(validate_id("seller_id", "  ").is_err());
/// ```
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 128 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 128,
        });
    }

    Ok(())
}

/// Validates a transfer justification and returns it trimmed.
///
/// An empty comment is reported as `Required`; the transfer planner turns
/// that into [`crate::CoreError::MissingComment`].
pub fn validate_comment(comment: &str) -> ValidationResult<String> {
    let comment = comment.trim();

    if comment.is_empty() {
        return Err(ValidationError::Required {
            field: "comment".to_string(),
        });
    }

    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(ValidationError::TooLong {
            field: "comment".to_string(),
            max: MAX_COMMENT_LEN,
        });
    }

    Ok(comment.to_string())
}

/// Parses a calendar date in `YYYY-MM-DD` form.
///
/// ```rust
/// use dulce_core::validation::parse_date;
///
/// assert!(parse_date("2024-02-01").is_ok());
/// assert!(parse_date("01/02/2024").is_err());
/// ```
pub fn parse_date(value: &str) -> ValidationResult<NaiveDate> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: "date".to_string(),
        });
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field: "date".to_string(),
        reason: "expected YYYY-MM-DD".to_string(),
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the number of packages a transfer moves. There is no upper
/// bound here; the origin row's stock is the only ceiling.
pub fn validate_packages_to_move(packages: i64) -> ValidationResult<()> {
    if packages <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "packages".to_string(),
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (promotional stock).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Row Validators
// =============================================================================

/// Validates a freshly issued vendor order row before it is stored.
///
/// Legacy rows loaded from storage are never re-validated; this only guards
/// new rows.
pub fn validate_new_row(row: &VendorOrderRow) -> ValidationResult<()> {
    validate_id("id", &row.id)?;
    validate_id("order_key", &row.order_key)?;
    validate_id("seller_id", &row.seller_id)?;
    validate_id("product_id", &row.product_id)?;

    if row.units_per_package < 1 {
        return Err(ValidationError::MustBePositive {
            field: "units_per_package".to_string(),
        });
    }

    if row.packages < 0 {
        return Err(ValidationError::OutOfRange {
            field: "packages".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    let remaining = row.available_packages();
    if remaining > row.packages {
        return Err(ValidationError::OutOfRange {
            field: "remaining_packages".to_string(),
            min: 0,
            max: row.packages,
        });
    }

    validate_price_cents("provider_price", row.provider_price_cents)?;
    validate_price_cents("unit_price_rivas", row.unit_price_rivas_cents)?;
    validate_price_cents("unit_price_san_jorge", row.unit_price_san_jorge_cents)?;
    validate_price_cents("unit_price_isla", row.unit_price_isla_cents)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::row;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "row-1").is_ok());
        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", &"x".repeat(200)).is_err());
    }

    #[test]
    fn test_validate_comment_trims() {
        assert_eq!(validate_comment("  moved to Isla  ").unwrap(), "moved to Isla");
        assert!(matches!(
            validate_comment("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_comment(&"a".repeat(MAX_COMMENT_LEN + 1)).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-01").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert!(parse_date("").is_err());
        assert!(parse_date("2024-13-01").is_err());
    }

    #[test]
    fn test_validate_packages_to_move() {
        assert!(validate_packages_to_move(1).is_ok());
        assert!(validate_packages_to_move(0).is_err());
        assert!(validate_packages_to_move(-4).is_err());
        // Large counts are left to the stock check
        assert!(validate_packages_to_move(25_000).is_ok());
    }

    #[test]
    fn test_validate_new_row() {
        let good = row("A", "2024-01-01", 5, 10);
        assert!(validate_new_row(&good).is_ok());

        let mut bad = good.clone();
        bad.units_per_package = 0;
        assert!(validate_new_row(&bad).is_err());

        let mut bad = good.clone();
        bad.remaining_packages = Some(6);
        bad.remaining_units = Some(60);
        assert!(validate_new_row(&bad).is_err());

        let mut bad = good;
        bad.provider_price_cents = -1;
        assert!(validate_new_row(&bad).is_err());
    }
}
