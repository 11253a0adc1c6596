// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

use crate::traffic::EngineStats;

// Re-export for public API
pub use server::metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Ingestion throughput, rejections and latency per feed source
// - Size of the engine's state (stores, hour buckets, evictions)
// - Dead letter queue and live stream subscribers
// - Kafka feed reconnects and circuit breaker state
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Ingestion
    pub events_ingested: IntCounterVec,
    pub events_rejected: IntCounterVec,
    pub ingest_duration: HistogramVec,

    // Engine state
    pub tracked_stores: IntGauge,
    pub hour_buckets: IntGauge,
    pub hour_buckets_evicted: IntCounter,

    // Fan-out and failures
    pub stream_subscribers: IntGauge,
    pub dlq_messages_total: IntCounter,

    // Feed transport
    pub feed_reconnect_attempts: IntCounterVec,
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_ingested = IntCounterVec::new(
            Opts::new("traffic_events_ingested_total", "Customer messages applied to the engine"),
            &["source"],
        )?;
        registry.register(Box::new(events_ingested.clone()))?;

        let events_rejected = IntCounterVec::new(
            Opts::new("traffic_events_rejected_total", "Customer messages that could not be applied"),
            &["source", "reason"],
        )?;
        registry.register(Box::new(events_rejected.clone()))?;

        let ingest_duration = HistogramVec::new(
            HistogramOpts::new("traffic_ingest_duration_seconds", "Time to ingest and broadcast one message")
                .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
            &["source"],
        )?;
        registry.register(Box::new(ingest_duration.clone()))?;

        let tracked_stores = IntGauge::new(
            "traffic_tracked_stores",
            "Stores with a live snapshot",
        )?;
        registry.register(Box::new(tracked_stores.clone()))?;

        let hour_buckets = IntGauge::new(
            "traffic_hour_buckets",
            "Hour buckets held across all stores",
        )?;
        registry.register(Box::new(hour_buckets.clone()))?;

        let hour_buckets_evicted = IntCounter::new(
            "traffic_hour_buckets_evicted_total",
            "Hour buckets dropped by bounded retention",
        )?;
        registry.register(Box::new(hour_buckets_evicted.clone()))?;

        let stream_subscribers = IntGauge::new(
            "traffic_stream_subscribers",
            "Connected live traffic stream subscribers",
        )?;
        registry.register(Box::new(stream_subscribers.clone()))?;

        let dlq_messages_total = IntCounter::new(
            "dlq_messages_total",
            "Total messages sent to the dead letter queue",
        )?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let feed_reconnect_attempts = IntCounterVec::new(
            Opts::new("feed_reconnect_attempts_total", "Kafka feed connection attempts"),
            &["outcome"],
        )?;
        registry.register(Box::new(feed_reconnect_attempts.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Kafka feed circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            events_ingested,
            events_rejected,
            ingest_duration,
            tracked_stores,
            hour_buckets,
            hour_buckets_evicted,
            stream_subscribers,
            dlq_messages_total,
            feed_reconnect_attempts,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one ingestion
    pub fn record_ingest(&self, source: &str, duration_secs: f64, rejected_reason: Option<&str>) {
        match rejected_reason {
            None => self.events_ingested.with_label_values(&[source]).inc(),
            Some(reason) => self.events_rejected.with_label_values(&[source, reason]).inc(),
        }
        self.ingest_duration.with_label_values(&[source]).observe(duration_secs);
    }

    pub fn record_engine_stats(&self, stats: EngineStats) {
        self.tracked_stores.set(stats.stores as i64);
        self.hour_buckets.set(stats.hour_buckets as i64);
    }

    pub fn record_eviction(&self, evicted: usize) {
        self.hour_buckets_evicted.inc_by(evicted as u64);
    }

    pub fn record_reconnect(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.feed_reconnect_attempts.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Vec<f64> {
        metrics
            .registry
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .map(|family| {
                family
                    .metric
                    .iter()
                    .map(|m| m.counter.value.unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.tracked_stores.set(0);
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_ingest_splits_accepted_and_rejected() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ingest("kafka", 0.0001, None);
        metrics.record_ingest("kafka", 0.0001, None);
        metrics.record_ingest("kafka", 0.0002, Some("malformed_timestamp"));

        assert_eq!(counter_value(&metrics, "traffic_events_ingested_total"), vec![2.0]);
        assert_eq!(counter_value(&metrics, "traffic_events_rejected_total"), vec![1.0]);
    }

    #[test]
    fn test_engine_gauges_and_evictions() {
        let metrics = Metrics::new().unwrap();
        metrics.record_engine_stats(EngineStats { stores: 3, hour_buckets: 40 });
        metrics.record_eviction(5);

        assert_eq!(metrics.tracked_stores.get(), 3);
        assert_eq!(metrics.hour_buckets.get(), 40);
        assert_eq!(metrics.hour_buckets_evicted.get(), 5);
    }
}
