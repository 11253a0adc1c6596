use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::engine::AggregationEngine;
use super::errors::TrafficError;
use super::models::{CustomerMessage, LiveSnapshot};

// ============================================================================
// Traffic Hub - ingestion plus fan-out
// ============================================================================
//
// The engine never notifies anyone. The hub ingests through it and then
// broadcasts the returned snapshot to whoever subscribed; it is the handle
// shared by the feed and the HTTP layer.
//
// ============================================================================

/// Update pushed to subscribers after each ingested message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrafficUpdate(pub LiveSnapshot);

/// What a new subscriber starts with.
pub struct Subscription {
    /// Every store's snapshot at subscription time.
    pub initial: Vec<LiveSnapshot>,
    /// Snapshots changed after `initial` was taken.
    pub updates: broadcast::Receiver<TrafficUpdate>,
}

#[derive(Clone)]
pub struct TrafficHub {
    engine: Arc<AggregationEngine>,
    tx: broadcast::Sender<TrafficUpdate>,
}

impl TrafficHub {
    pub fn new(engine: Arc<AggregationEngine>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { engine, tx }
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    /// Ingest one message and broadcast the resulting snapshot.
    pub fn publish(&self, message: &CustomerMessage) -> Result<LiveSnapshot, TrafficError> {
        let snapshot = self.engine.ingest(message)?;
        // Err only means nobody is listening
        let _ = self.tx.send(TrafficUpdate(snapshot.clone()));
        Ok(snapshot)
    }

    /// Decode a JSON `CustomerMessage` and publish it.
    pub fn publish_payload(&self, payload: &str) -> Result<LiveSnapshot, TrafficError> {
        let message: CustomerMessage = serde_json::from_str(payload)?;
        self.publish(&message)
    }

    pub fn subscribe(&self) -> Subscription {
        // Subscribe before reading so nothing falls between the two
        let updates = self.tx.subscribe();
        let initial = self.engine.all_live_snapshots();
        Subscription { initial, updates }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
