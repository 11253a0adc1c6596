use actix_web::{web, Responder};
use actix_web_lab::sse::{self, Sse};
use futures_util::{future, stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use super::ApiState;
use crate::metrics::Metrics;
use crate::traffic::Subscription;

const INITIAL_EVENT: &str = "initialTraffic";
const UPDATE_EVENT: &str = "trafficUpdate";
const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Keeps the subscriber gauge in step with open streams.
struct SubscriberGuard(Arc<Metrics>);

impl SubscriberGuard {
    fn new(metrics: Arc<Metrics>) -> Self {
        metrics.stream_subscribers.inc();
        Self(metrics)
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.0.stream_subscribers.dec();
        tracing::debug!("Traffic stream subscriber disconnected");
    }
}

fn sse_event<T: Serialize>(name: &'static str, data: &T) -> Result<sse::Event, serde_json::Error> {
    Ok(sse::Data::new_json(data)?.event(name).into())
}

/// `GET /api/traffic/stream`: every store's snapshot, then each update as it happens.
pub async fn traffic_stream(state: web::Data<ApiState>) -> impl Responder {
    let Subscription { initial, updates } = state.hub.subscribe();
    let guard = SubscriberGuard::new(state.metrics.clone());

    tracing::debug!(stores = initial.len(), "Traffic stream subscriber connected");

    let first = stream::once(future::ready(sse_event(INITIAL_EVENT, &initial)));

    let rest = stream::unfold((updates, guard), |(mut updates, guard)| async move {
        loop {
            match updates.recv().await {
                Ok(update) => return Some((sse_event(UPDATE_EVENT, &update), (updates, guard))),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Traffic stream subscriber lagged, skipping updates");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::from_stream(first.chain(rest)).with_keep_alive(KEEP_ALIVE)
}
