//! Pipeline stage services.
//!
//! Each stage is an independent, stateless service; `replenishment` wires
//! them together behind the provider seams.

pub mod distribution;
pub mod forecasting;
pub mod replenishment;
pub mod stock_levels;

pub use distribution::DistributionService;
pub use forecasting::DemandForecaster;
pub use replenishment::{
    ReplenishmentRun, ReplenishmentService, SalesHistoryProvider, StockSnapshotProvider,
};
pub use stock_levels::{StockLevelCalculator, StockLevelSummary};
