use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ServiceError;
use crate::models::{ForecastResult, StockLevel, StockPolicy, StockSnapshot, StockStatus};

/// On-hand below this counts as genuinely negative physical stock; values in
/// (-0.5, 0] are rounding noise from fractional-unit bookkeeping.
const NEGATIVE_STOCK_CUTOFF: f64 = -0.5;

/// Computes minimum/ideal/maximum stock targets and a replenishment status
/// from one forecast, one resolved policy and one stock snapshot.
///
/// Stateless: every call is a pure function of its inputs, and recomputation
/// with identical inputs yields identical output.
#[derive(Debug, Clone, Default)]
pub struct StockLevelCalculator;

impl StockLevelCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Derives the stock targets for one (product, location) pair.
    ///
    /// Products whose trailing-365-day sales fall short of the policy
    /// threshold get all three targets suppressed to zero: too little
    /// history to justify carrying safety stock. Non-finite demand or
    /// factors below 1 are contract violations and fail fast.
    pub fn compute(
        &self,
        forecast: &ForecastResult,
        policy: &StockPolicy,
        snapshot: &StockSnapshot,
    ) -> Result<StockLevel, ServiceError> {
        if !forecast.daily_demand.is_finite() {
            return Err(ServiceError::ValidationError(format!(
                "Non-finite daily demand for product {} at location {}",
                forecast.product_id, forecast.location_id
            )));
        }
        if policy.ideal_factor < 1.0 || policy.max_factor < 1.0 {
            return Err(ServiceError::ValidationError(format!(
                "Stock factors must be >= 1 (ideal {}, max {})",
                policy.ideal_factor, policy.max_factor
            )));
        }

        let (stock_minimum, stock_ideal, stock_maximum) =
            if forecast.sales_365d < policy.min_sales_threshold {
                (0.0, 0.0, 0.0)
            } else {
                let minimum = forecast.daily_demand * policy.days_of_stock as f64;
                (
                    round2(minimum),
                    round2(minimum * policy.ideal_factor),
                    round2(minimum * policy.max_factor),
                )
            };

        let status = classify(snapshot.available, stock_minimum, stock_maximum);

        Ok(StockLevel {
            product_id: forecast.product_id,
            location_id: forecast.location_id,
            current_available: snapshot.available,
            current_onhand: snapshot.on_hand,
            current_reserved: snapshot.reserved,
            stock_minimum,
            stock_ideal,
            stock_maximum,
            daily_demand: forecast.daily_demand,
            days_of_stock: policy.days_of_stock,
            forecast_method: forecast.method,
            trend: forecast.trend,
            sales_30d: forecast.sales_30d,
            sales_60d: forecast.sales_60d,
            sales_90d: forecast.sales_90d,
            sales_365d: forecast.sales_365d,
            amount_90d: forecast.amount_90d,
            status,
        })
    }

    /// Status counts across a computed run.
    pub fn summary(&self, levels: &[StockLevel]) -> StockLevelSummary {
        let total = levels.len();
        let count = |status: StockStatus| levels.iter().filter(|l| l.status == status).count();
        let below_minimum = count(StockStatus::BelowMinimum);
        let out_of_stock = count(StockStatus::OutOfStock);
        let surplus = count(StockStatus::Surplus);
        StockLevelSummary {
            total,
            ok: count(StockStatus::Ok),
            below_minimum,
            out_of_stock,
            surplus,
            pct_below_minimum: percentage(below_minimum, total),
            pct_surplus: percentage(surplus, total),
        }
    }

    /// Rows belonging to the top `n` products by summed 90-day sales amount
    /// that sit below minimum (or out of stock) somewhere with a positive
    /// minimum target. Suppressed rows never qualify.
    pub fn top_below_minimum(&self, levels: &[StockLevel], n: usize) -> Vec<StockLevel> {
        let mut amount_by_product: HashMap<i64, Decimal> = HashMap::new();
        for level in levels {
            *amount_by_product
                .entry(level.product_id)
                .or_insert(Decimal::ZERO) += level.amount_90d;
        }

        let mut ranked: Vec<(i64, Decimal)> = amount_by_product.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let top_ids: std::collections::HashSet<i64> =
            ranked.into_iter().take(n).map(|(id, _)| id).collect();

        levels
            .iter()
            .filter(|l| {
                top_ids.contains(&l.product_id)
                    && matches!(
                        l.status,
                        StockStatus::BelowMinimum | StockStatus::OutOfStock
                    )
                    && l.stock_minimum > 0.0
            })
            .cloned()
            .collect()
    }

    /// Rows with genuinely negative physical stock, for audit. Uses on-hand
    /// rather than available: reservations are not a bookkeeping fault.
    pub fn negative_stock(&self, levels: &[StockLevel]) -> Vec<StockLevel> {
        levels
            .iter()
            .filter(|l| l.current_onhand < NEGATIVE_STOCK_CUTOFF)
            .cloned()
            .collect()
    }
}

/// Summary of one calculation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevelSummary {
    pub total: usize,
    pub ok: usize,
    pub below_minimum: usize,
    pub out_of_stock: usize,
    pub surplus: usize,
    pub pct_below_minimum: f64,
    pub pct_surplus: f64,
}

fn percentage(part: usize, total: usize) -> f64 {
    (part as f64 / total.max(1) as f64 * 1000.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Ordered classification; the first matching rule wins, so every
/// combination of inputs lands in exactly one status.
fn classify(available: f64, minimum: f64, maximum: f64) -> StockStatus {
    if minimum == 0.0 {
        // Suppressed pair: no replenishment need regardless of stock held.
        if available <= 0.0 {
            StockStatus::OutOfStock
        } else {
            StockStatus::Ok
        }
    } else if available <= 0.0 {
        StockStatus::OutOfStock
    } else if available < minimum {
        StockStatus::BelowMinimum
    } else if available > maximum {
        StockStatus::Surplus
    } else {
        StockStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ForecastMethod, Trend};
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn forecast(daily_demand: f64, sales_365d: f64) -> ForecastResult {
        ForecastResult {
            product_id: 1,
            location_id: 2,
            daily_demand,
            method: ForecastMethod::MedianAdjusted,
            confidence: 0.7,
            trend: Trend::Stable,
            sales_30d: 0.0,
            sales_60d: 0.0,
            sales_90d: 0.0,
            sales_365d,
            amount_90d: dec!(0),
        }
    }

    fn policy() -> StockPolicy {
        StockPolicy {
            days_of_stock: 30,
            ideal_factor: 2.0,
            max_factor: 4.0,
            min_sales_threshold: 5.0,
        }
    }

    #[test]
    fn targets_follow_demand_and_factors() {
        let calc = StockLevelCalculator::new();
        let level = calc
            .compute(
                &forecast(1.5, 100.0),
                &policy(),
                &StockSnapshot::new(60.0, 0.0),
            )
            .unwrap();
        assert_eq!(level.stock_minimum, 45.0);
        assert_eq!(level.stock_ideal, 90.0);
        assert_eq!(level.stock_maximum, 180.0);
        assert_eq!(level.status, StockStatus::Ok);
    }

    #[test]
    fn targets_round_to_two_decimals() {
        let calc = StockLevelCalculator::new();
        let level = calc
            .compute(
                &forecast(0.0192, 7.0),
                &policy(),
                &StockSnapshot::new(1.0, 0.0),
            )
            .unwrap();
        // 0.0192 * 30 = 0.576 -> 0.58
        assert_eq!(level.stock_minimum, 0.58);
        assert_eq!(level.stock_ideal, 1.15);
        assert_eq!(level.stock_maximum, 2.3);
    }

    #[test]
    fn low_sales_suppress_all_targets_together() {
        let calc = StockLevelCalculator::new();
        let level = calc
            .compute(
                &forecast(2.0, 4.0),
                &policy(),
                &StockSnapshot::new(50.0, 0.0),
            )
            .unwrap();
        assert_eq!(level.stock_minimum, 0.0);
        assert_eq!(level.stock_ideal, 0.0);
        assert_eq!(level.stock_maximum, 0.0);
        // Held stock does not make a suppressed pair a surplus.
        assert_eq!(level.status, StockStatus::Ok);
    }

    #[test]
    fn suppressed_pair_without_stock_is_out_of_stock() {
        let calc = StockLevelCalculator::new();
        let level = calc
            .compute(&forecast(2.0, 4.0), &policy(), &StockSnapshot::new(0.0, 0.0))
            .unwrap();
        assert_eq!(level.status, StockStatus::OutOfStock);
    }

    #[test]
    fn ordering_invariant_holds_when_minimum_positive() {
        let calc = StockLevelCalculator::new();
        for demand in [0.2, 1.0, 3.7, 55.0] {
            let level = calc
                .compute(
                    &forecast(demand, 100.0),
                    &policy(),
                    &StockSnapshot::new(10.0, 0.0),
                )
                .unwrap();
            assert!(level.stock_minimum <= level.stock_ideal);
            assert!(level.stock_ideal <= level.stock_maximum);
        }
    }

    #[rstest]
    #[case(-3.0, StockStatus::OutOfStock)]
    #[case(0.0, StockStatus::OutOfStock)]
    #[case(20.0, StockStatus::BelowMinimum)]
    #[case(45.0, StockStatus::Ok)]
    #[case(180.0, StockStatus::Ok)]
    #[case(180.5, StockStatus::Surplus)]
    fn status_classification_is_total(#[case] available: f64, #[case] expected: StockStatus) {
        // minimum 45, ideal 90, maximum 180
        let calc = StockLevelCalculator::new();
        let level = calc
            .compute(
                &forecast(1.5, 100.0),
                &policy(),
                &StockSnapshot::new(available, 0.0),
            )
            .unwrap();
        assert_eq!(level.status, expected);
    }

    #[test]
    fn available_uses_reserved_but_audit_keeps_onhand() {
        let calc = StockLevelCalculator::new();
        let level = calc
            .compute(
                &forecast(1.5, 100.0),
                &policy(),
                &StockSnapshot::new(50.0, 40.0),
            )
            .unwrap();
        // 50 on hand minus 40 reserved leaves 10 available: below the 45
        // minimum even though physical stock looks healthy.
        assert_eq!(level.status, StockStatus::BelowMinimum);
        assert_eq!(level.current_onhand, 50.0);
        assert_eq!(level.current_reserved, 40.0);
    }

    #[test]
    fn recompute_with_identical_inputs_is_identical() {
        let calc = StockLevelCalculator::new();
        let f = forecast(1.5, 100.0);
        let p = policy();
        let s = StockSnapshot::new(60.0, 5.0);
        let a = calc.compute(&f, &p, &s).unwrap();
        let b = calc.compute(&f, &p, &s).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn non_finite_demand_fails_fast() {
        let calc = StockLevelCalculator::new();
        let result = calc.compute(
            &forecast(f64::NAN, 100.0),
            &policy(),
            &StockSnapshot::new(0.0, 0.0),
        );
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn factor_below_one_fails_fast() {
        let calc = StockLevelCalculator::new();
        let mut bad = policy();
        bad.ideal_factor = 0.5;
        let result = calc.compute(
            &forecast(1.0, 100.0),
            &bad,
            &StockSnapshot::new(0.0, 0.0),
        );
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    fn level_with(status_available: f64, onhand: f64, amount: Decimal, product: i64) -> StockLevel {
        StockLevelCalculator::new()
            .compute(
                &ForecastResult {
                    product_id: product,
                    ..forecast(1.5, 100.0)
                },
                &policy(),
                &StockSnapshot {
                    on_hand: onhand,
                    reserved: 0.0,
                    available: status_available,
                },
            )
            .map(|mut l| {
                l.amount_90d = amount;
                l
            })
            .unwrap()
    }

    #[test]
    fn summary_counts_every_status() {
        let calc = StockLevelCalculator::new();
        let levels = vec![
            level_with(60.0, 60.0, dec!(0), 1),   // ok
            level_with(10.0, 10.0, dec!(0), 2),   // below minimum
            level_with(0.0, 0.0, dec!(0), 3),     // out of stock
            level_with(200.0, 200.0, dec!(0), 4), // surplus
        ];
        let summary = calc.summary(&levels);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.ok, 1);
        assert_eq!(summary.below_minimum, 1);
        assert_eq!(summary.out_of_stock, 1);
        assert_eq!(summary.surplus, 1);
        assert_eq!(summary.pct_below_minimum, 25.0);
        assert_eq!(summary.pct_surplus, 25.0);
    }

    #[test]
    fn top_below_minimum_ranks_by_amount_and_filters_status() {
        let calc = StockLevelCalculator::new();
        let levels = vec![
            level_with(10.0, 10.0, dec!(100), 1), // below, low revenue
            level_with(10.0, 10.0, dec!(900), 2), // below, high revenue
            level_with(60.0, 60.0, dec!(800), 3), // ok, high revenue
        ];
        let top = calc.top_below_minimum(&levels, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].product_id, 2);
    }

    #[test]
    fn negative_stock_uses_half_unit_cutoff_on_onhand() {
        let calc = StockLevelCalculator::new();
        let levels = vec![
            level_with(10.0, -0.4, dec!(0), 1),
            level_with(10.0, -2.0, dec!(0), 2),
        ];
        let negative = calc.negative_stock(&levels);
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].product_id, 2);
    }
}
