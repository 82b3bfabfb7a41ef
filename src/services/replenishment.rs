use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    DistributionResult, PolicyTable, RedistributionOpportunity, SalesEvent, SalesPoint,
    StockLevel, StockPosition, StockSnapshot, TargetLevel,
};
use crate::services::distribution::DistributionService;
use crate::services::forecasting::DemandForecaster;
use crate::services::stock_levels::{StockLevelCalculator, StockLevelSummary};

/// Supplies the sales history the forecaster consumes.
#[async_trait]
pub trait SalesHistoryProvider: Send + Sync {
    async fn sales_events(&self) -> Result<Vec<SalesEvent>, ServiceError>;
}

/// Supplies current stock positions with the product attributes the policy
/// table and exclusion filters key on.
#[async_trait]
pub trait StockSnapshotProvider: Send + Sync {
    async fn stock_positions(&self) -> Result<Vec<StockPosition>, ServiceError>;
}

/// Output of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentRun {
    pub levels: Vec<StockLevel>,
    pub summary: StockLevelSummary,
    pub distribution: DistributionResult,
}

/// Orchestrates the forecasting → target-level → allocation pipeline.
///
/// Holds the stateless stage services plus the external collaborators
/// (sales history, stock snapshots, event sink). Each public method is one
/// pipeline stage; `run` chains them.
#[derive(Clone)]
pub struct ReplenishmentService {
    config: Arc<AppConfig>,
    forecaster: DemandForecaster,
    calculator: StockLevelCalculator,
    distribution: DistributionService,
    policy_table: PolicyTable,
    sales_provider: Arc<dyn SalesHistoryProvider>,
    snapshot_provider: Arc<dyn StockSnapshotProvider>,
    event_sender: Option<EventSender>,
}

impl ReplenishmentService {
    pub fn new(
        config: Arc<AppConfig>,
        sales_provider: Arc<dyn SalesHistoryProvider>,
        snapshot_provider: Arc<dyn StockSnapshotProvider>,
        event_sender: Option<EventSender>,
    ) -> Self {
        let replenishment = &config.replenishment;
        let forecaster = DemandForecaster::new(replenishment.demand_method);
        let distribution = DistributionService::new(replenishment.central_location_id);
        let policy_table = replenishment.policy_table();
        Self {
            config,
            forecaster,
            calculator: StockLevelCalculator::new(),
            distribution,
            policy_table,
            sales_provider,
            snapshot_provider,
            event_sender,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Computes stock targets for every non-excluded (product, location)
    /// position the snapshot provider reports.
    ///
    /// Positions without sales history get a no-data forecast (zero demand,
    /// suppressed targets). Sales rows without a matching position carry no
    /// stock to act on and are dropped.
    #[instrument(skip(self))]
    pub async fn calculate_stock_levels(&self) -> Result<Vec<StockLevel>, ServiceError> {
        let positions = self.snapshot_provider.stock_positions().await?;
        let sales = self.sales_provider.sales_events().await?;
        let window_days = self.config.replenishment.window_days;

        let mut sales_by_pair: HashMap<(i64, i64), Vec<SalesPoint>> = HashMap::new();
        for event in &sales {
            sales_by_pair
                .entry((event.product_id, event.location_id))
                .or_default()
                .push(event.point());
        }

        let mut positions: Vec<&StockPosition> = positions
            .iter()
            .filter(|p| !self.is_excluded(p))
            .collect();
        positions.sort_by_key(|p| (p.product_id, p.location_id));

        let mut levels = Vec::with_capacity(positions.len());
        for position in positions {
            let series = sales_by_pair
                .get(&(position.product_id, position.location_id))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let forecast = self.forecaster.calculate_demand(
                series,
                position.product_id,
                position.location_id,
                window_days,
            );
            let policy =
                self.policy_table
                    .resolve(&position.brand, &position.category, &position.subcategory);
            let snapshot = StockSnapshot {
                on_hand: position.on_hand,
                reserved: position.reserved,
                available: position.available,
            };
            levels.push(self.calculator.compute(&forecast, &policy, &snapshot)?);
        }

        let summary = self.calculator.summary(&levels);
        info!(
            pairs = summary.total,
            below_minimum = summary.below_minimum,
            out_of_stock = summary.out_of_stock,
            "Stock levels calculated"
        );
        self.emit(Event::StockLevelsCalculated {
            pairs: summary.total,
            below_minimum: summary.below_minimum,
            out_of_stock: summary.out_of_stock,
            generated_at: Utc::now(),
        })
        .await;

        Ok(levels)
    }

    /// Allocates central stock toward the chosen target and reports the
    /// purchases that remain.
    #[instrument(skip(self, levels, unit_costs), fields(levels = levels.len()))]
    pub async fn run_distribution(
        &self,
        levels: &[StockLevel],
        target: TargetLevel,
        unit_costs: &HashMap<i64, Decimal>,
    ) -> DistributionResult {
        let result = self.distribution.allocate_from_central(levels, target, unit_costs);
        self.emit(Event::DistributionGenerated {
            transfers: result.summary.total_transfers,
            purchase_needs: result.summary.total_purchase_needs,
            units_to_transfer: result.summary.total_units_to_transfer,
            units_to_purchase: result.summary.total_units_to_purchase,
            target_level: target,
        })
        .await;
        result
    }

    /// Moves stock from surplus peers to deficit peers, no purchasing.
    #[instrument(skip(self, levels), fields(levels = levels.len()))]
    pub async fn run_redistribution(
        &self,
        levels: &[StockLevel],
        target: TargetLevel,
    ) -> DistributionResult {
        let result = self.distribution.redistribute_surplus(levels, target);
        self.emit(Event::SurplusRedistributionGenerated {
            transfers: result.summary.total_transfers,
            units_to_transfer: result.summary.total_units_to_transfer,
            target_level: target,
        })
        .await;
        result
    }

    /// Read-only surplus/deficit pairing scan over computed levels.
    pub fn redistribution_opportunities(
        &self,
        levels: &[StockLevel],
    ) -> Vec<RedistributionOpportunity> {
        self.distribution.redistribution_opportunities(levels)
    }

    /// Summary, ranking and audit helpers over a computed run.
    pub fn calculator(&self) -> &StockLevelCalculator {
        &self.calculator
    }

    /// Runs the full pipeline: forecasts, stock levels, then central
    /// distribution toward `target`.
    #[instrument(skip(self, unit_costs))]
    pub async fn run(
        &self,
        target: TargetLevel,
        unit_costs: &HashMap<i64, Decimal>,
    ) -> Result<ReplenishmentRun, ServiceError> {
        let levels = self.calculate_stock_levels().await?;
        let summary = self.calculator.summary(&levels);
        let distribution = self.run_distribution(&levels, target, unit_costs).await;
        Ok(ReplenishmentRun {
            levels,
            summary,
            distribution,
        })
    }

    fn is_excluded(&self, position: &StockPosition) -> bool {
        let cfg = &self.config.replenishment;
        if cfg.excluded_locations.contains(&position.location_id) {
            return true;
        }
        if cfg
            .excluded_brands
            .iter()
            .any(|b| b.eq_ignore_ascii_case(&position.brand))
        {
            return true;
        }
        cfg.excluded_products
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&position.product_code))
    }

    /// Events are advisory; a full or closed channel never fails the run.
    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!("Failed to emit event: {}", e);
            }
        }
    }
}
