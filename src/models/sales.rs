use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One signed sales event for a (product, location) pair.
///
/// Quantity and amount are negative for returns and credit notes. Events are
/// immutable and externally sourced; the caller pre-aggregates to at most one
/// row per calendar day, though the forecaster re-aggregates defensively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesEvent {
    pub product_id: i64,
    pub location_id: i64,
    pub date: NaiveDate,
    pub quantity: f64,
    pub amount: Decimal,
}

impl SalesEvent {
    pub fn point(&self) -> SalesPoint {
        SalesPoint {
            date: self.date,
            quantity: self.quantity,
            amount: self.amount,
        }
    }
}

/// A sales observation already scoped to one (product, location) series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesPoint {
    pub date: NaiveDate,
    pub quantity: f64,
    pub amount: Decimal,
}

impl SalesPoint {
    pub fn new(date: NaiveDate, quantity: f64, amount: Decimal) -> Self {
        Self {
            date,
            quantity,
            amount,
        }
    }
}

/// Current stock position for a (product, location) pair, as supplied by the
/// snapshot collaborator, together with the product attributes the policy
/// table and exclusion filters key on.
///
/// `available` is on-hand minus reserved; the caller either derives it or
/// supplies an already-derived figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPosition {
    pub product_id: i64,
    pub location_id: i64,
    pub product_code: String,
    pub brand: String,
    pub category: String,
    pub subcategory: String,
    pub on_hand: f64,
    pub reserved: f64,
    pub available: f64,
}
