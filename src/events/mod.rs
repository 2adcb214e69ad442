//! Lightweight in-process event bus.
//!
//! Writes to the projection store emit an audit event; a background task
//! drains the channel and logs it. Nothing subscribes synchronously, so a
//! full channel never blocks a request for long.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::projections::RiskType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ProjectionUpdated {
        so_number: String,
        part_number: String,
        risk_type: RiskType,
        quantity: Decimal,
        actor: String,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Best-effort send; a lost audit event is logged, never an error the
    /// caller sees.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!(%err, "event channel closed, audit event dropped");
        }
    }
}

/// Drains the event channel until every sender is gone.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match event {
            Event::ProjectionUpdated {
                so_number,
                part_number,
                risk_type,
                quantity,
                actor,
                timestamp,
            } => {
                info!(
                    %so_number,
                    %part_number,
                    risk_type = risk_type.as_str(),
                    %quantity,
                    %actor,
                    %timestamp,
                    "projection updated"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn dropped_receiver_does_not_error_the_sender() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        sender
            .send(Event::ProjectionUpdated {
                so_number: "SO1".into(),
                part_number: "P".into(),
                risk_type: RiskType::NoLowRisk,
                quantity: dec!(1),
                actor: "planner".into(),
                timestamp: Utc::now(),
            })
            .await;
    }
}
