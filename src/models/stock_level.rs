use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::forecast::{ForecastMethod, Trend};

/// Replenishment status of a (product, location) pair relative to its
/// computed targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockStatus {
    Ok,
    BelowMinimum,
    OutOfStock,
    Surplus,
}

/// Raw stock figures for a (product, location) pair at snapshot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub on_hand: f64,
    pub reserved: f64,
    /// On-hand minus reserved; the figure replenishment decisions use.
    pub available: f64,
}

impl StockSnapshot {
    pub fn new(on_hand: f64, reserved: f64) -> Self {
        Self {
            on_hand,
            reserved,
            available: on_hand - reserved,
        }
    }
}

/// Computed stock targets and classification for a (product, location) pair.
///
/// Invariant: `stock_minimum <= stock_ideal <= stock_maximum` whenever
/// `stock_minimum > 0`; all three are zero together when suppressed by the
/// minimum-sales rule. Created fresh on every recompute; a later run fully
/// supersedes an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: i64,
    pub location_id: i64,
    /// Available stock (on-hand minus reserved), used for replenishment.
    pub current_available: f64,
    /// Physical on-hand stock, retained for negative-stock audit.
    pub current_onhand: f64,
    pub current_reserved: f64,
    pub stock_minimum: f64,
    pub stock_ideal: f64,
    pub stock_maximum: f64,
    pub daily_demand: f64,
    /// Days of demand the minimum target covers.
    pub days_of_stock: u32,
    pub forecast_method: ForecastMethod,
    pub trend: Trend,
    pub sales_30d: f64,
    pub sales_60d: f64,
    pub sales_90d: f64,
    pub sales_365d: f64,
    pub amount_90d: Decimal,
    pub status: StockStatus,
}

impl StockLevel {
    /// The reference quantity for the requested target level.
    pub fn target(&self, level: super::policy::TargetLevel) -> f64 {
        match level {
            super::policy::TargetLevel::Minimum => self.stock_minimum,
            super::policy::TargetLevel::Ideal => self.stock_ideal,
            super::policy::TargetLevel::Maximum => self.stock_maximum,
        }
    }
}
