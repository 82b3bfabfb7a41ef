use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::TargetLevel;

/// Events emitted as pipeline milestones complete. Consumers (reporting,
/// export, audit) subscribe on the receiving end of the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockLevelsCalculated {
        pairs: usize,
        below_minimum: usize,
        out_of_stock: usize,
        generated_at: DateTime<Utc>,
    },
    DistributionGenerated {
        transfers: usize,
        purchase_needs: usize,
        units_to_transfer: i64,
        units_to_purchase: i64,
        target_level: TargetLevel,
    },
    SurplusRedistributionGenerated {
        transfers: usize,
        units_to_transfer: i64,
        target_level: TargetLevel,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Convenience constructor for a bounded event channel.
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}
