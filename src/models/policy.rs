use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Reference quantity a caller selects as the replenishment goal for a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum TargetLevel {
    #[serde(rename = "minimo")]
    #[strum(serialize = "minimo")]
    Minimum,
    #[serde(rename = "ideal")]
    #[strum(serialize = "ideal")]
    Ideal,
    #[serde(rename = "maximo")]
    #[strum(serialize = "maximo")]
    Maximum,
}

impl Default for TargetLevel {
    fn default() -> Self {
        TargetLevel::Ideal
    }
}

/// Policy bundle resolved for one (product, location) pair.
///
/// Read-only for the calculation; the calculator is a stateless function of
/// (forecast, policy, snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPolicy {
    /// Days of demand the minimum target must cover.
    pub days_of_stock: u32,
    /// `stock_ideal = stock_minimum * ideal_factor`, must be >= 1.
    pub ideal_factor: f64,
    /// `stock_maximum = stock_minimum * max_factor`, must be >= 1.
    pub max_factor: f64,
    /// Trailing-365-day sales below this suppress all three targets.
    pub min_sales_threshold: f64,
}

/// In-memory resolved policy table, the product of the (excluded)
/// configuration collaborator.
///
/// Days-of-stock overrides resolve with precedence brand > subcategory >
/// category > default; suppression thresholds resolve subcategory > default.
/// Override keys are matched case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyTable {
    pub default_days_of_stock: u32,
    pub ideal_factor: f64,
    pub max_factor: f64,
    pub default_min_sales_threshold: f64,
    #[serde(default)]
    pub days_by_brand: HashMap<String, u32>,
    #[serde(default)]
    pub days_by_subcategory: HashMap<String, u32>,
    #[serde(default)]
    pub days_by_category: HashMap<String, u32>,
    #[serde(default)]
    pub threshold_by_subcategory: HashMap<String, f64>,
}

impl PolicyTable {
    pub fn new(
        default_days_of_stock: u32,
        ideal_factor: f64,
        max_factor: f64,
        default_min_sales_threshold: f64,
    ) -> Self {
        Self {
            default_days_of_stock,
            ideal_factor,
            max_factor,
            default_min_sales_threshold,
            days_by_brand: HashMap::new(),
            days_by_subcategory: HashMap::new(),
            days_by_category: HashMap::new(),
            threshold_by_subcategory: HashMap::new(),
        }
    }

    /// Resolves the policy bundle for a product's attributes.
    pub fn resolve(&self, brand: &str, category: &str, subcategory: &str) -> StockPolicy {
        StockPolicy {
            days_of_stock: self.days_of_stock(brand, category, subcategory),
            ideal_factor: self.ideal_factor,
            max_factor: self.max_factor,
            min_sales_threshold: self.min_sales_threshold(subcategory),
        }
    }

    fn days_of_stock(&self, brand: &str, category: &str, subcategory: &str) -> u32 {
        if let Some(days) = lookup_u32(&self.days_by_brand, brand) {
            return days;
        }
        if let Some(days) = lookup_u32(&self.days_by_subcategory, subcategory) {
            return days;
        }
        if let Some(days) = lookup_u32(&self.days_by_category, category) {
            return days;
        }
        self.default_days_of_stock
    }

    fn min_sales_threshold(&self, subcategory: &str) -> f64 {
        if !subcategory.is_empty() {
            if let Some(threshold) = self
                .threshold_by_subcategory
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(subcategory))
                .map(|(_, v)| *v)
            {
                return threshold;
            }
        }
        self.default_min_sales_threshold
    }
}

fn lookup_u32(map: &HashMap<String, u32>, key: &str) -> Option<u32> {
    if key.is_empty() {
        return None;
    }
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}
