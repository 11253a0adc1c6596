use chrono::{SecondsFormat, Utc};
use rand::Rng;
use std::time::Duration;

use crate::traffic::{CustomerMessage, StoreId};

/// Stand-in for the Kafka feed: random traffic for a single store.
#[derive(Debug, Clone)]
pub struct TrafficSimulator {
    store_id: StoreId,
    min_interval: Duration,
    max_interval: Duration,
}

impl TrafficSimulator {
    pub fn new(store_id: StoreId, min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            store_id,
            min_interval,
            max_interval: max_interval.max(min_interval),
        }
    }

    /// 0-2 customers in and 0-2 out, stamped now.
    pub fn next_message(&self) -> CustomerMessage {
        let mut rng = rand::rng();
        CustomerMessage {
            store_id: self.store_id,
            customers_in: rng.random_range(0..=2),
            customers_out: rng.random_range(0..=2),
            time_stamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn next_delay(&self) -> Duration {
        let min = self.min_interval.as_millis() as u64;
        let max = self.max_interval.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}
