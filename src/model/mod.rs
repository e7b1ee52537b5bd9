//! Typed catalog records
//!
//! Rows arrive from the store as JSON objects. Each record type parses and
//! validates itself; a row that fails is logged and skipped so one bad entry
//! never blanks a whole collection.

pub mod category;
pub mod dish;
pub mod dish_tag;
pub mod offer;
pub mod serde_helpers;
pub mod tag;

pub use category::{Category, CategoryLabel};
pub use dish::Dish;
pub use dish_tag::DishTag;
pub use offer::Offer;
pub use tag::Tag;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::store::Table;
use crate::types::{CatalogError, Result};

/// A record stored in one table
pub trait Record: DeserializeOwned + Sized {
    /// Table the record lives in
    const TABLE: Table;

    /// Field-level checks beyond what deserialization enforces
    fn validate(&self) -> std::result::Result<(), String>;

    /// Parse and validate one row
    fn from_row(row: &JsonValue) -> Result<Self> {
        let invalid = |reason: String| CatalogError::InvalidRecord {
            table: Self::TABLE,
            reason,
        };

        let record: Self = serde_json::from_value(row.clone()).map_err(|e| invalid(e.to_string()))?;
        record.validate().map_err(invalid)?;
        Ok(record)
    }
}

/// Parse a fetched collection, skipping rows that don't validate
pub fn parse_rows<R: Record>(rows: &[JsonValue]) -> Vec<R> {
    rows.iter()
        .filter_map(|row| match R::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                let id = row.get("id").and_then(|v| v.as_str()).unwrap_or("<none>");
                warn!(table = %R::TABLE, id, error = %e, "Skipping invalid row");
                None
            }
        })
        .collect()
}

/// Reject empty or whitespace-only values
pub(crate) fn require_text(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} is required"))
    } else {
        Ok(())
    }
}
