use actix::prelude::*;
use std::sync::Arc;
use std::time::Instant;

use crate::config::FeedSource;
use crate::messaging::{KafkaTrafficConsumer, TrafficSimulator};
use crate::metrics::Metrics;
use crate::traffic::{CustomerMessage, LiveSnapshot, TrafficError, TrafficHub};
use crate::utils::CircuitBreaker;
use super::{AddToDlq, DlqActor};

// ============================================================================
// Traffic Feed Actor - single ingestion point
// ============================================================================
//
// Every customer message, simulated or from Kafka, is handled here one at a
// time: ingest through the hub (which broadcasts the new snapshot), record
// metrics, and route rejected messages to the DLQ.
//
// ============================================================================

pub struct TrafficFeedActor {
    hub: TrafficHub,
    source: FeedSource,
    dlq_actor: Addr<DlqActor>,
    metrics: Arc<Metrics>,
    kafka: Option<Arc<KafkaTrafficConsumer>>,
}

impl TrafficFeedActor {
    pub fn new(hub: TrafficHub, source: FeedSource, dlq_actor: Addr<DlqActor>, metrics: Arc<Metrics>) -> Self {
        let kafka = match &source {
            FeedSource::Kafka { brokers, topic, group_id } => Some(Arc::new(
                KafkaTrafficConsumer::new(brokers, topic, group_id, metrics.clone()),
            )),
            FeedSource::Simulated { .. } => None,
        };

        Self {
            hub,
            source,
            dlq_actor,
            metrics,
            kafka,
        }
    }

    /// Circuit breaker of the Kafka consumer, if this feed reads from Kafka.
    pub fn circuit_breaker(&self) -> Option<CircuitBreaker> {
        self.kafka.as_ref().map(|consumer| consumer.circuit_breaker())
    }

    fn ingest<F>(&self, raw: impl FnOnce() -> String, publish: F) -> Result<LiveSnapshot, TrafficError>
    where
        F: FnOnce(&TrafficHub) -> Result<LiveSnapshot, TrafficError>,
    {
        let source = self.source.label();
        let started = Instant::now();
        let result = publish(&self.hub);
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(snapshot) => {
                self.metrics.record_ingest(source, elapsed, None);
                tracing::debug!(
                    store_id = snapshot.store_id,
                    current_customers = snapshot.current_customers,
                    subscribers = self.hub.subscriber_count(),
                    "Broadcast traffic update"
                );
            }
            Err(e) => {
                self.metrics.record_ingest(source, elapsed, Some(e.reason()));
                tracing::warn!(error = %e, source, "Rejected customer message");
                self.dlq_actor.do_send(AddToDlq {
                    source: source.to_string(),
                    payload: raw(),
                    reason: e.reason().to_string(),
                    error_message: e.to_string(),
                });
            }
        }

        result
    }

    fn schedule_simulated(&self, ctx: &mut Context<Self>, simulator: TrafficSimulator) {
        ctx.run_later(simulator.next_delay(), move |act, ctx| {
            let message = simulator.next_message();
            tracing::info!(
                store_id = message.store_id,
                customers_in = message.customers_in,
                customers_out = message.customers_out,
                time_stamp = %message.time_stamp,
                "Received simulated traffic message"
            );
            ctx.address().do_send(IngestMessage(message));
            act.schedule_simulated(ctx, simulator);
        });
    }

    fn start_kafka(&self, ctx: &mut Context<Self>) {
        let Some(consumer) = self.kafka.clone() else {
            return;
        };
        let addr = ctx.address();

        ctx.spawn(
            async move {
                consumer
                    .run(|payload| addr.do_send(IngestPayload { payload }))
                    .await;
            }
            .into_actor(self),
        );
    }
}

impl Actor for TrafficFeedActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(source = self.source.label(), "TrafficFeedActor started");

        match self.source.clone() {
            FeedSource::Simulated { store_id, min_interval, max_interval } => {
                let simulator = TrafficSimulator::new(store_id, min_interval, max_interval);
                self.schedule_simulated(ctx, simulator);
            }
            FeedSource::Kafka { .. } => self.start_kafka(ctx),
        }
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("TrafficFeedActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

/// An already decoded customer message.
#[derive(Message, Debug)]
#[rtype(result = "Result<LiveSnapshot, TrafficError>")]
pub struct IngestMessage(pub CustomerMessage);

/// A raw JSON customer message off the wire.
#[derive(Message, Debug)]
#[rtype(result = "Result<LiveSnapshot, TrafficError>")]
pub struct IngestPayload {
    pub payload: String,
}

impl Handler<IngestMessage> for TrafficFeedActor {
    type Result = Result<LiveSnapshot, TrafficError>;

    fn handle(&mut self, msg: IngestMessage, _: &mut Self::Context) -> Self::Result {
        let message = msg.0;
        self.ingest(
            || serde_json::to_string(&message).unwrap_or_default(),
            |hub| hub.publish(&message),
        )
    }
}

impl Handler<IngestPayload> for TrafficFeedActor {
    type Result = Result<LiveSnapshot, TrafficError>;

    fn handle(&mut self, msg: IngestPayload, _: &mut Self::Context) -> Self::Result {
        let payload = msg.payload;
        self.ingest(|| payload.clone(), |hub| hub.publish_payload(&payload))
    }
}
