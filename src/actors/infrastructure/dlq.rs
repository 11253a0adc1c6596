use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::Metrics;

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Keeps customer messages the engine refused (bad JSON, bad timestamps) so
// they can be inspected over HTTP. In memory and bounded: once full, the
// oldest entry is dropped. Totals keep counting past the bound.
//
// ============================================================================

pub struct DlqActor {
    entries: VecDeque<DlqMessage>,
    capacity: usize,
    total_messages: u64,
    by_reason: HashMap<String, u64>,
    metrics: Arc<Metrics>,
}

impl DlqActor {
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            total_messages: 0,
            by_reason: HashMap::new(),
            metrics,
        }
    }
}

impl Actor for DlqActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(capacity = self.capacity, "DlqActor started - Dead Letter Queue ready");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AddToDlq {
    pub source: String,
    pub payload: String,
    pub reason: String,
    pub error_message: String,
}

#[derive(Message)]
#[rtype(result = "Vec<DlqMessage>")]
pub struct GetDlqMessages {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "DlqStats")]
pub struct GetDlqStats;

#[derive(Debug, Clone, Serialize)]
pub struct DlqMessage {
    pub id: Uuid,
    pub source: String,
    pub payload: String,
    pub reason: String,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, MessageResponse)]
pub struct DlqStats {
    pub total_messages: u64,
    pub retained: usize,
    pub by_reason: HashMap<String, u64>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DlqActor {
    type Result = ();

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) {
        let entry = DlqMessage {
            id: Uuid::new_v4(),
            source: msg.source,
            payload: msg.payload,
            reason: msg.reason,
            error_message: msg.error_message,
            failed_at: Utc::now(),
        };

        tracing::error!(
            dlq_id = %entry.id,
            source = %entry.source,
            reason = %entry.reason,
            error = %entry.error_message,
            "💀 Adding message to Dead Letter Queue"
        );

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }

        *self.by_reason.entry(entry.reason.clone()).or_insert(0) += 1;
        self.total_messages += 1;
        self.metrics.dlq_messages_total.inc();
        self.entries.push_back(entry);
    }
}

impl Handler<GetDlqMessages> for DlqActor {
    type Result = Vec<DlqMessage>;

    /// Newest first.
    fn handle(&mut self, msg: GetDlqMessages, _: &mut Self::Context) -> Self::Result {
        self.entries.iter().rev().take(msg.limit).cloned().collect()
    }
}

impl Handler<GetDlqStats> for DlqActor {
    type Result = DlqStats;

    fn handle(&mut self, _msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        DlqStats {
            total_messages: self.total_messages,
            retained: self.entries.len(),
            by_reason: self.by_reason.clone(),
        }
    }
}
