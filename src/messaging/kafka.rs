use rdkafka::{
    config::ClientConfig,
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    message::Message,
};
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, RetryConfig};

/// Consumes JSON customer messages from a Kafka topic.
pub struct KafkaTrafficConsumer {
    brokers: String,
    topic: String,
    group_id: String,
    circuit_breaker: CircuitBreaker,
    retry_config: RetryConfig,
    metrics: Arc<Metrics>,
}

impl KafkaTrafficConsumer {
    pub fn new(brokers: &str, topic: &str, group_id: &str, metrics: Arc<Metrics>) -> Self {
        // Open after 5 consecutive receive errors, retry after 30s
        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            cool_down: std::time::Duration::from_secs(30),
            success_threshold: 3,
        };

        Self {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            circuit_breaker: CircuitBreaker::new(cb_config),
            retry_config: RetryConfig::reconnect(),
            metrics,
        }
    }

    /// Handle for health checks on the receive path.
    pub fn circuit_breaker(&self) -> CircuitBreaker {
        self.circuit_breaker.clone()
    }

    fn connect(&self) -> Result<StreamConsumer, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", "6000")
            .create()?;

        consumer.subscribe(&[self.topic.as_str()])?;
        Ok(consumer)
    }

    /// Consume forever, handing every message payload to `on_payload`.
    ///
    /// A dropped connection or an open circuit leads to a fresh consumer,
    /// connected with exponential backoff.
    pub async fn run<F>(&self, mut on_payload: F)
    where
        F: FnMut(String),
    {
        loop {
            let connected = retry_with_backoff(&self.retry_config, |attempt| {
                tracing::debug!(attempt, brokers = %self.brokers, "Connecting Kafka consumer");
                let result = self.connect();
                self.metrics.record_reconnect(result.is_ok());
                std::future::ready(result)
            })
            .await;

            let consumer = match connected {
                Ok(consumer) => consumer,
                Err(e) => {
                    tracing::error!(error = %e, "Kafka consumer unavailable");
                    continue;
                }
            };

            tracing::info!(
                topic = %self.topic,
                group_id = %self.group_id,
                "Subscribed to Kafka traffic topic"
            );

            loop {
                if let Err(open) = self.circuit_breaker.acquire().await {
                    tracing::error!(
                        topic = %self.topic,
                        retry_in_ms = open.retry_in.as_millis() as u64,
                        "Circuit breaker open - pausing Kafka feed"
                    );
                    tokio::time::sleep(open.retry_in).await;
                    break;
                }

                match consumer.recv().await {
                    Ok(message) => {
                        self.circuit_breaker.record_success().await;

                        match message.payload() {
                            Some(bytes) => {
                                on_payload(String::from_utf8_lossy(bytes).into_owned());
                            }
                            None => {
                                tracing::debug!(
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    "Skipping Kafka message without payload"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, topic = %self.topic, "Kafka receive error");
                        self.circuit_breaker.record_failure().await;
                    }
                }
            }
        }
    }
}
