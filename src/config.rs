use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{DemandMethod, PolicyTable};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_WINDOW_DAYS: u32 = 365;
const DEFAULT_DAYS_OF_STOCK: u32 = 30;
const DEFAULT_IDEAL_FACTOR: f64 = 2.0;
const DEFAULT_MAX_FACTOR: f64 = 4.0;
const DEFAULT_MIN_SALES_THRESHOLD: f64 = 5.0;

/// Replenishment policy configuration: demand method, forecast window, and
/// the resolved stock-target policy table.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReplenishmentConfig {
    /// Demand estimation selection policy
    #[serde(default)]
    pub demand_method: DemandMethod,

    /// Trailing window (days) the forecaster restricts each series to
    #[serde(default = "default_window_days")]
    #[validate(range(min = 1))]
    pub window_days: u32,

    /// Days of demand the minimum stock target must cover
    #[serde(default = "default_days_of_stock")]
    #[validate(range(min = 1))]
    pub default_days_of_stock: u32,

    /// stock_ideal = stock_minimum * ideal_factor
    #[serde(default = "default_ideal_factor")]
    #[validate(range(min = 1.0))]
    pub ideal_factor: f64,

    /// stock_maximum = stock_minimum * max_factor
    #[serde(default = "default_max_factor")]
    #[validate(range(min = 1.0))]
    pub max_factor: f64,

    /// Trailing-365-day sales below this suppress all stock targets
    #[serde(default = "default_min_sales_threshold")]
    #[validate(range(min = 0.0))]
    pub min_sales_threshold: f64,

    /// The single location peers draw stock from before purchases
    pub central_location_id: i64,

    /// Locations excluded before the core sees any data
    #[serde(default)]
    pub excluded_locations: Vec<i64>,

    /// Brand names excluded before the core sees any data
    #[serde(default)]
    pub excluded_brands: Vec<String>,

    /// Product codes excluded before the core sees any data
    #[serde(default)]
    pub excluded_products: Vec<String>,

    /// Days-of-stock overrides by brand name
    #[serde(default)]
    pub days_of_stock_by_brand: std::collections::HashMap<String, u32>,

    /// Days-of-stock overrides by subcategory name
    #[serde(default)]
    pub days_of_stock_by_subcategory: std::collections::HashMap<String, u32>,

    /// Days-of-stock overrides by category name
    #[serde(default)]
    pub days_of_stock_by_category: std::collections::HashMap<String, u32>,

    /// Suppression-threshold overrides by subcategory name
    #[serde(default)]
    pub min_sales_threshold_by_subcategory: std::collections::HashMap<String, f64>,
}

impl ReplenishmentConfig {
    /// Builds the resolved policy table the calculator consumes.
    pub fn policy_table(&self) -> PolicyTable {
        PolicyTable {
            default_days_of_stock: self.default_days_of_stock,
            ideal_factor: self.ideal_factor,
            max_factor: self.max_factor,
            default_min_sales_threshold: self.min_sales_threshold,
            days_by_brand: self.days_of_stock_by_brand.clone(),
            days_by_subcategory: self.days_of_stock_by_subcategory.clone(),
            days_by_category: self.days_of_stock_by_category.clone(),
            threshold_by_subcategory: self.min_sales_threshold_by_subcategory.clone(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Replenishment policy settings
    #[validate]
    pub replenishment: ReplenishmentConfig,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

fn default_days_of_stock() -> u32 {
    DEFAULT_DAYS_OF_STOCK
}

fn default_ideal_factor() -> f64 {
    DEFAULT_IDEAL_FACTOR
}

fn default_max_factor() -> f64 {
    DEFAULT_MAX_FACTOR
}

fn default_min_sales_threshold() -> f64 {
    DEFAULT_MIN_SALES_THRESHOLD
}

/// Loads configuration from layered sources: `config/default.toml`, an
/// environment-specific file selected by `RUN_ENV`, and `REPLENISH_*`
/// environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, ServiceError> {
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let config_dir = Path::new(CONFIG_DIR);

    let builder = Config::builder()
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false))
        .add_source(
            Environment::with_prefix("REPLENISH")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

    let config: AppConfig = builder.build()?.try_deserialize()?;
    config.validate()?;

    info!(
        environment = %config.environment,
        demand_method = %config.replenishment.demand_method,
        window_days = config.replenishment.window_days,
        central_location = config.replenishment.central_location_id,
        "Configuration loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replenishment(ideal: f64, max: f64) -> ReplenishmentConfig {
        ReplenishmentConfig {
            demand_method: DemandMethod::MedianAdjusted,
            window_days: 365,
            default_days_of_stock: 30,
            ideal_factor: ideal,
            max_factor: max,
            min_sales_threshold: 5.0,
            central_location_id: 1,
            excluded_locations: vec![],
            excluded_brands: vec![],
            excluded_products: vec![],
            days_of_stock_by_brand: Default::default(),
            days_of_stock_by_subcategory: Default::default(),
            days_of_stock_by_category: Default::default(),
            min_sales_threshold_by_subcategory: Default::default(),
        }
    }

    #[test]
    fn factors_below_one_fail_validation() {
        assert!(replenishment(0.5, 4.0).validate().is_err());
        assert!(replenishment(2.0, 0.9).validate().is_err());
        assert!(replenishment(2.0, 4.0).validate().is_ok());
    }

    #[test]
    fn policy_table_carries_defaults_and_overrides() {
        let mut cfg = replenishment(2.0, 4.0);
        cfg.days_of_stock_by_brand.insert("ACME".into(), 45);
        let table = cfg.policy_table();
        assert_eq!(table.default_days_of_stock, 30);
        assert_eq!(table.resolve("ACME", "", "").days_of_stock, 45);
        assert_eq!(table.resolve("OTHER", "", "").days_of_stock, 30);
    }
}
