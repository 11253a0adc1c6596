use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::traffic::Retention;

/// Where traffic events come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSource {
    /// Generate random events for one store.
    Simulated {
        store_id: i64,
        min_interval: Duration,
        max_interval: Duration,
    },
    /// Consume JSON customer messages from a Kafka topic.
    Kafka {
        brokers: String,
        topic: String,
        group_id: String,
    },
}

impl FeedSource {
    pub fn label(&self) -> &'static str {
        match self {
            FeedSource::Simulated { .. } => "simulated",
            FeedSource::Kafka { .. } => "kafka",
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,
    pub metrics_port: u16,
    pub feed: FeedSource,
    pub retention: Retention,
    pub broadcast_capacity: usize,
    pub dlq_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feed = match lookup("TRAFFIC_FEED").as_deref().unwrap_or("simulated") {
            "simulated" => {
                let min_ms: u64 = parse_or(&lookup, "SIMULATED_INTERVAL_MIN_MS", 2000)?;
                let max_ms: u64 = parse_or(&lookup, "SIMULATED_INTERVAL_MAX_MS", 5000)?;
                if min_ms > max_ms {
                    bail!(
                        "SIMULATED_INTERVAL_MIN_MS ({}) must not exceed SIMULATED_INTERVAL_MAX_MS ({})",
                        min_ms,
                        max_ms
                    );
                }
                FeedSource::Simulated {
                    store_id: parse_or(&lookup, "SIMULATED_STORE_ID", 10)?,
                    min_interval: Duration::from_millis(min_ms),
                    max_interval: Duration::from_millis(max_ms),
                }
            }
            "kafka" => FeedSource::Kafka {
                brokers: lookup("KAFKA_BROKERS").unwrap_or_else(|| "127.0.0.1:9092".to_string()),
                topic: lookup("KAFKA_TOPIC").unwrap_or_else(|| "store-traffic".to_string()),
                group_id: lookup("KAFKA_GROUP_ID")
                    .unwrap_or_else(|| "store-dashboard-group".to_string()),
            },
            other => bail!("TRAFFIC_FEED must be 'simulated' or 'kafka', got '{}'", other),
        };

        let retention = match lookup("HOUR_BUCKET_RETENTION_HOURS") {
            None => Retention::Unbounded,
            Some(raw) => {
                let hours: u32 = raw
                    .parse()
                    .with_context(|| format!("HOUR_BUCKET_RETENTION_HOURS must be a number, got '{}'", raw))?;
                if hours < 24 {
                    bail!("HOUR_BUCKET_RETENTION_HOURS must cover the 24 hour history window");
                }
                Retention::Hours(hours)
            }
        };

        Ok(Self {
            http_host: lookup("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port: parse_or(&lookup, "PORT", 3001)?,
            metrics_port: parse_or(&lookup, "METRICS_PORT", 9090)?,
            feed,
            retention,
            broadcast_capacity: parse_or(&lookup, "BROADCAST_CAPACITY", 256)?,
            dlq_capacity: parse_or(&lookup, "DLQ_CAPACITY", 1000)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
