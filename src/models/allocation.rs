use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::policy::TargetLevel;

/// Proposed unit movement between two locations for one product.
///
/// The before/after figures snapshot both ends at proposal time; ownership
/// of the proposal passes to the caller for export or consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferProposal {
    pub product_id: i64,
    pub source_location: i64,
    pub dest_location: i64,
    /// Whole units to move, always >= 1.
    pub quantity: i64,
    pub source_before: f64,
    pub source_after: f64,
    pub dest_before: f64,
    pub dest_after: f64,
    pub dest_minimum: f64,
    pub dest_ideal: f64,
    /// The destination's reference quantity for the run's target level.
    pub dest_target: f64,
}

/// Why a purchase need was raised instead of (or in addition to) a transfer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseCause {
    /// The central pool was already exhausted when the peer was reached.
    CentralOutOfStock,
    /// The central pool covered the peer only partially.
    PeerUncovered,
    /// The central node itself sits below its own minimum.
    CentralBelowMinimum,
}

/// Residual units no internal source can cover, to be bought externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseNeed {
    pub product_id: i64,
    pub dest_location: i64,
    /// Whole units to purchase, always >= 1.
    pub quantity: i64,
    pub dest_available: f64,
    pub dest_target: f64,
    pub central_available: f64,
    pub central_minimum: f64,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub cause: PurchaseCause,
}

/// Aggregate figures for one allocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub total_transfers: usize,
    pub total_purchase_needs: usize,
    pub total_units_to_transfer: i64,
    pub total_units_to_purchase: i64,
    pub total_cost_purchases: Decimal,
    pub unique_products: usize,
    pub source_locations: usize,
    pub dest_locations: usize,
    pub target_level: TargetLevel,
    pub generated_at: DateTime<Utc>,
}

/// Output of one allocation run: transfers, residual purchase needs, and a
/// summary. Redistribution runs never produce purchase needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub transfers: Vec<TransferProposal>,
    pub purchase_needs: Vec<PurchaseNeed>,
    pub summary: DistributionSummary,
}

impl DistributionResult {
    pub fn summarize(
        transfers: Vec<TransferProposal>,
        purchase_needs: Vec<PurchaseNeed>,
        target_level: TargetLevel,
    ) -> Self {
        let unique_products = {
            let mut ids: Vec<i64> = transfers
                .iter()
                .map(|t| t.product_id)
                .chain(purchase_needs.iter().map(|p| p.product_id))
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        let source_locations = {
            let mut ids: Vec<i64> = transfers.iter().map(|t| t.source_location).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        let dest_locations = {
            let mut ids: Vec<i64> = transfers.iter().map(|t| t.dest_location).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        let summary = DistributionSummary {
            total_transfers: transfers.len(),
            total_purchase_needs: purchase_needs.len(),
            total_units_to_transfer: transfers.iter().map(|t| t.quantity).sum(),
            total_units_to_purchase: purchase_needs.iter().map(|p| p.quantity).sum(),
            total_cost_purchases: purchase_needs.iter().map(|p| p.total_cost).sum(),
            unique_products,
            source_locations,
            dest_locations,
            target_level,
            generated_at: Utc::now(),
        };
        Self {
            transfers,
            purchase_needs,
            summary,
        }
    }
}

/// A possible surplus-to-deficit move surfaced for operator review, without
/// committing pool accounting the way a redistribution run does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionOpportunity {
    pub product_id: i64,
    pub source_location: i64,
    pub dest_location: i64,
    pub suggested_quantity: i64,
    pub source_disposable: f64,
    pub dest_needed: f64,
}
