//! Value objects exchanged across the replenishment pipeline.
//!
//! Every type here is owned by the pipeline run that created it. Entities
//! never hold references back to their source rows; lookups are by integer
//! id into caller-supplied maps.

pub mod allocation;
pub mod forecast;
pub mod policy;
pub mod sales;
pub mod stock_level;

pub use allocation::{
    DistributionResult, DistributionSummary, PurchaseCause, PurchaseNeed,
    RedistributionOpportunity, TransferProposal,
};
pub use forecast::{DemandMethod, ForecastMethod, ForecastResult, Trend};
pub use policy::{PolicyTable, StockPolicy, TargetLevel};
pub use sales::{SalesEvent, SalesPoint, StockPosition};
pub use stock_level::{StockLevel, StockSnapshot, StockStatus};
