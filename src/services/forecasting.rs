use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::models::{DemandMethod, ForecastMethod, ForecastResult, SalesPoint, Trend};

/// Minimum distinct sale-days before the regression estimator fits a model.
const MIN_SALE_DAYS_FOR_TREND: usize = 30;
/// Covered-day gates for the combined selection policy.
const MIN_COVERED_DAYS_FOR_MOVING: i64 = 14;
const MIN_COVERED_DAYS_FOR_TREND: i64 = 30;
/// Trailing window of the weighted moving average.
const MOVING_AVERAGE_WINDOW_DAYS: i64 = 90;
/// Days ahead the regression projects and averages.
const PROJECTION_HORIZON_DAYS: i64 = 15;

/// Estimates daily demand for a (product, location) sales series.
///
/// Four estimators are computed unconditionally (cheap relative to I/O) and
/// one is selected per the configured [`DemandMethod`]. All date arithmetic
/// anchors to the series' own maximum observed date, never the wall clock,
/// so a lagging input refresh cannot fabricate a zero-demand tail.
#[derive(Debug, Clone)]
pub struct DemandForecaster {
    method: DemandMethod,
}

impl DemandForecaster {
    pub fn new(method: DemandMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> DemandMethod {
        self.method
    }

    /// Produces the forecast for one series restricted to the trailing
    /// `window_days` ending at the series' maximum date.
    ///
    /// An empty series (before or after restriction) is a terminal
    /// `no_data` outcome, not an error.
    #[instrument(skip(self, sales), fields(points = sales.len()))]
    pub fn calculate_demand(
        &self,
        sales: &[SalesPoint],
        product_id: i64,
        location_id: i64,
        window_days: u32,
    ) -> ForecastResult {
        let Some(end) = sales.iter().map(|p| p.date).max() else {
            return ForecastResult::no_data(product_id, location_id);
        };
        let window_start = end - Duration::days(window_days as i64);
        let window: Vec<SalesPoint> = sales
            .iter()
            .filter(|p| p.date >= window_start)
            .copied()
            .collect();
        if window.is_empty() {
            return ForecastResult::no_data(product_id, location_id);
        }

        let sales_30d = quantity_since(&window, end - Duration::days(30));
        let sales_60d = quantity_since(&window, end - Duration::days(60));
        let sales_90d = quantity_since(&window, end - Duration::days(90));
        let sales_365d: f64 = window.iter().map(|p| p.quantity).sum();
        let amount_90d = amount_since(&window, end - Duration::days(90));

        // Calendar span actually covered, first observed sale to anchor date.
        let first = window.iter().map(|p| p.date).min().unwrap_or(end);
        let days_covered = (end - first).num_days() + 1;

        let buckets = daily_buckets(&window);

        let simple = simple_average(sales_365d, days_covered);
        let median = median_adjusted(&buckets, days_covered);
        let moving = weighted_moving_average(&buckets, end);
        let (regression, trend, regression_confidence) = trend_regression(&buckets, end);

        let (demand, method, confidence) = self.select(
            simple,
            median,
            moving,
            regression,
            regression_confidence,
            days_covered,
            trend,
        );

        ForecastResult {
            product_id,
            location_id,
            daily_demand: demand.max(0.0),
            method,
            confidence,
            trend,
            sales_30d,
            sales_60d,
            sales_90d,
            sales_365d,
            amount_90d,
        }
    }

    /// Forecasts every (product, location) series in one pass.
    pub fn calculate_demand_batch(
        &self,
        sales_by_pair: &HashMap<(i64, i64), Vec<SalesPoint>>,
        window_days: u32,
    ) -> HashMap<(i64, i64), ForecastResult> {
        sales_by_pair
            .iter()
            .map(|(&(product_id, location_id), series)| {
                (
                    (product_id, location_id),
                    self.calculate_demand(series, product_id, location_id, window_days),
                )
            })
            .collect()
    }

    fn select(
        &self,
        simple: f64,
        median: f64,
        moving: f64,
        regression: f64,
        regression_confidence: f64,
        days_covered: i64,
        trend: Trend,
    ) -> (f64, ForecastMethod, f64) {
        match self.method {
            DemandMethod::SimpleAverage => (simple, ForecastMethod::SimpleAverage, 0.6),
            DemandMethod::MedianAdjusted => (median, ForecastMethod::MedianAdjusted, 0.7),
            DemandMethod::Combined => {
                if days_covered < MIN_COVERED_DAYS_FOR_MOVING {
                    // Sparse history: the median is the most robust fallback.
                    (median, ForecastMethod::MedianAdjusted, 0.5)
                } else if days_covered < MIN_COVERED_DAYS_FOR_TREND {
                    (moving, ForecastMethod::MovingAverage, 0.6)
                } else if regression_confidence > 0.6 && trend != Trend::Stable {
                    (
                        regression,
                        ForecastMethod::TrendRegression,
                        regression_confidence,
                    )
                } else {
                    let blended = 0.3 * median + 0.4 * moving + 0.3 * regression;
                    (blended, ForecastMethod::Combined, 0.7)
                }
            }
        }
    }
}

/// Sums one quantity per calendar day. The caller should pre-aggregate to a
/// row per day, but duplicate dates are folded here defensively.
fn daily_buckets(window: &[SalesPoint]) -> BTreeMap<NaiveDate, f64> {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for point in window {
        *buckets.entry(point.date).or_insert(0.0) += point.quantity;
    }
    buckets
}

fn quantity_since(window: &[SalesPoint], from: NaiveDate) -> f64 {
    window
        .iter()
        .filter(|p| p.date >= from)
        .map(|p| p.quantity)
        .sum()
}

fn amount_since(window: &[SalesPoint], from: NaiveDate) -> Decimal {
    window
        .iter()
        .filter(|p| p.date >= from)
        .map(|p| p.amount)
        .sum()
}

/// Total quantity over calendar days covered.
fn simple_average(total_quantity: f64, days_covered: i64) -> f64 {
    total_quantity / days_covered.max(1) as f64
}

/// Median of sale-day quantities, discounted by the share of days that had
/// any sale. A single abnormally large day does not move the median, and the
/// multiplier keeps sparse sellers from looking like daily movers.
fn median_adjusted(buckets: &BTreeMap<NaiveDate, f64>, days_covered: i64) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    let mut daily: Vec<f64> = buckets.values().copied().collect();
    daily.sort_by(f64::total_cmp);
    let mid = daily.len() / 2;
    let median = if daily.len() % 2 == 0 {
        (daily[mid - 1] + daily[mid]) / 2.0
    } else {
        daily[mid]
    };
    let proportion = buckets.len() as f64 / days_covered.max(1) as f64;
    median * proportion
}

/// Weighted average over the trailing 90-day calendar grid, zero-filling
/// days without sales. Weights rise linearly from 1.0 (oldest) to 2.0
/// (most recent).
fn weighted_moving_average(buckets: &BTreeMap<NaiveDate, f64>, end: NaiveDate) -> f64 {
    let start = end - Duration::days(MOVING_AVERAGE_WINDOW_DAYS);
    let grid_len = MOVING_AVERAGE_WINDOW_DAYS + 1;

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for i in 0..grid_len {
        let day = start + Duration::days(i);
        let weight = 1.0 + i as f64 / (grid_len - 1) as f64;
        let quantity = buckets.get(&day).copied().unwrap_or(0.0);
        weighted_sum += quantity * weight;
        weight_sum += weight;
    }
    if weight_sum > 0.0 {
        weighted_sum / weight_sum
    } else {
        0.0
    }
}

/// Linear fit of sale-day quantity against day index.
///
/// With fewer than 30 distinct sale-days this degrades to the span average
/// at a fixed 0.3 confidence. Otherwise confidence is the explained-variance
/// ratio clamped to [0.3, 0.95], the trend compares the slope to ±1% of the
/// mean daily quantity, and the estimate is the mean of the next 15 fitted
/// days floored at zero.
fn trend_regression(buckets: &BTreeMap<NaiveDate, f64>, end: NaiveDate) -> (f64, Trend, f64) {
    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return (0.0, Trend::Stable, 0.3);
    };

    if buckets.len() < MIN_SALE_DAYS_FOR_TREND {
        let total: f64 = buckets.values().sum();
        let span_days = (last - first).num_days() + 1;
        return (total / span_days.max(1) as f64, Trend::Stable, 0.3);
    }

    let xs: Vec<f64> = buckets
        .keys()
        .map(|d| (*d - first).num_days() as f64)
        .collect();
    let ys: Vec<f64> = buckets.values().copied().collect();
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut var_x = 0.0;
    let mut cov_xy = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        var_x += (x - mean_x) * (x - mean_x);
        cov_xy += (x - mean_x) * (y - mean_y);
    }
    // >= 30 distinct days guarantees x variance > 0.
    let slope = cov_xy / var_x;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        let fitted = intercept + slope * x;
        ss_res += (y - fitted) * (y - fitted);
        ss_tot += (y - mean_y) * (y - mean_y);
    }
    let r2 = if ss_tot > f64::EPSILON {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };
    let confidence = r2.clamp(0.3, 0.95);

    let slope_ratio = slope / mean_y.max(0.01);
    let trend = if slope_ratio > 0.01 {
        Trend::Increasing
    } else if slope_ratio < -0.01 {
        Trend::Decreasing
    } else {
        Trend::Stable
    };

    let future_start = (end - first).num_days();
    let projected: f64 = (0..PROJECTION_HORIZON_DAYS)
        .map(|i| intercept + slope * (future_start + i) as f64)
        .sum::<f64>()
        / PROJECTION_HORIZON_DAYS as f64;

    (projected.max(0.0), trend, confidence)
}
