use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Estimation method that produced a forecast.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ForecastMethod {
    SimpleAverage,
    MedianAdjusted,
    MovingAverage,
    TrendRegression,
    Combined,
    NoData,
}

/// Direction of the fitted demand trend over the forecast window.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Configured selection policy for the demand estimate.
///
/// The wire tokens are the ones the configuration collaborator persists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum DemandMethod {
    /// Total quantity over calendar days. Sensitive to single large orders.
    #[serde(rename = "promedio_simple")]
    #[strum(serialize = "promedio_simple")]
    SimpleAverage,
    /// Median of sale-day quantities discounted by sparsity. Robust to
    /// outliers; the recommended default.
    #[serde(rename = "mediana")]
    #[strum(serialize = "mediana")]
    MedianAdjusted,
    /// Data-volume-gated blend of median, weighted moving average and trend
    /// regression.
    #[serde(rename = "combinado")]
    #[strum(serialize = "combinado")]
    Combined,
}

impl Default for DemandMethod {
    fn default() -> Self {
        DemandMethod::MedianAdjusted
    }
}

/// Demand estimate for one (product, location) pair.
///
/// Created once per pipeline run and never mutated. The window sums are
/// computed from the raw series independently of the selected estimator,
/// always ending at the series' own maximum date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: i64,
    pub location_id: i64,
    /// Estimated units per day, clamped to be non-negative.
    pub daily_demand: f64,
    pub method: ForecastMethod,
    /// Reliability of the estimate in `[0, 1]`.
    pub confidence: f64,
    pub trend: Trend,
    pub sales_30d: f64,
    pub sales_60d: f64,
    pub sales_90d: f64,
    pub sales_365d: f64,
    /// Sales amount over the trailing 90 days, used for revenue ranking.
    pub amount_90d: Decimal,
}

impl ForecastResult {
    /// Terminal result for a series that is empty after window restriction.
    pub fn no_data(product_id: i64, location_id: i64) -> Self {
        Self {
            product_id,
            location_id,
            daily_demand: 0.0,
            method: ForecastMethod::NoData,
            confidence: 0.0,
            trend: Trend::Stable,
            sales_30d: 0.0,
            sales_60d: 0.0,
            sales_90d: 0.0,
            sales_365d: 0.0,
            amount_90d: Decimal::ZERO,
        }
    }
}
