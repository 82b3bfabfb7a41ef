//! Replenish Engine Library
//!
//! Multi-location retail inventory replenishment core: demand forecasting,
//! stock target calculation, and transfer/purchase allocation.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;

pub use config::{load_config, AppConfig, ReplenishmentConfig};
pub use errors::ServiceError;
pub use events::{event_channel, Event, EventSender};
pub use models::{
    DemandMethod, DistributionResult, ForecastMethod, ForecastResult, PolicyTable, PurchaseCause,
    PurchaseNeed, RedistributionOpportunity, SalesEvent, SalesPoint, StockLevel, StockPolicy,
    StockPosition, StockSnapshot, StockStatus, TargetLevel, TransferProposal, Trend,
};
pub use services::{
    DemandForecaster, DistributionService, ReplenishmentRun, ReplenishmentService,
    SalesHistoryProvider, StockLevelCalculator, StockLevelSummary, StockSnapshotProvider,
};
