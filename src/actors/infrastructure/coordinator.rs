use actix::prelude::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::HealthStatus;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::traffic::TrafficHub;
use super::{DlqActor, GetSystemHealth, HealthMonitorActor, TrafficFeedActor, UpdateHealth};

// ============================================================================
// Coordinator Actor - Orchestrates all system actors
// ============================================================================
//
// Responsibilities:
// - Starts the child actors and reports their health
// - Periodically logs system health
// - Refreshes engine gauges and evicts expired hour buckets
// - Coordinates graceful shutdown
//
// Actor Hierarchy:
//   CoordinatorActor (Supervisor)
//   ├── HealthMonitorActor
//   ├── DlqActor
//   └── TrafficFeedActor
//
// ============================================================================

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(15);

pub struct CoordinatorActor {
    config: Config,
    hub: TrafficHub,
    metrics: Arc<Metrics>,
    traffic_feed: Option<Addr<TrafficFeedActor>>,
    health_monitor: Option<Addr<HealthMonitorActor>>,
    dlq_actor: Option<Addr<DlqActor>>,
}

impl CoordinatorActor {
    pub fn new(config: Config, hub: TrafficHub, metrics: Arc<Metrics>) -> Self {
        Self {
            config,
            hub,
            metrics,
            traffic_feed: None,
            health_monitor: None,
            dlq_actor: None,
        }
    }

    fn start_child_actors(&mut self, _ctx: &mut Context<Self>) {
        tracing::info!("Starting supervised child actors");

        let dlq_actor = DlqActor::new(self.config.dlq_capacity, self.metrics.clone()).start();
        self.dlq_actor = Some(dlq_actor.clone());

        let traffic_feed = TrafficFeedActor::new(
            self.hub.clone(),
            self.config.feed.clone(),
            dlq_actor,
            self.metrics.clone(),
        );

        let health_monitor =
            HealthMonitorActor::new(traffic_feed.circuit_breaker(), self.metrics.clone()).start();
        self.health_monitor = Some(health_monitor.clone());

        health_monitor.do_send(UpdateHealth {
            component: "dlq_actor".to_string(),
            status: HealthStatus::Healthy,
            details: Some("DLQ actor started".to_string()),
        });

        self.traffic_feed = Some(traffic_feed.start());

        health_monitor.do_send(UpdateHealth {
            component: "traffic_feed".to_string(),
            status: HealthStatus::Healthy,
            details: Some(format!("{} feed started", self.config.feed.label())),
        });

        tracing::info!("✅ All supervised actors started successfully");
    }

    fn run_maintenance(&self) {
        let engine = self.hub.engine();

        let evicted = engine.evict_expired(Utc::now());
        if evicted > 0 {
            tracing::info!(evicted, "Evicted expired hour buckets");
            self.metrics.record_eviction(evicted);
        }

        self.metrics.record_engine_stats(engine.stats());
    }
}

impl Actor for CoordinatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            feed = self.config.feed.label(),
            retention = ?self.config.retention,
            "🎯 CoordinatorActor started - store traffic aggregation"
        );
        self.start_child_actors(ctx);

        ctx.run_interval(MAINTENANCE_INTERVAL, |act, _ctx| act.run_maintenance());

        ctx.run_interval(HEALTH_LOG_INTERVAL, |act, _ctx| {
            if let Some(ref health_monitor) = act.health_monitor {
                let health_monitor = health_monitor.clone();
                actix::spawn(async move {
                    match health_monitor.send(GetSystemHealth).await {
                        Ok(health) => match health.overall_status {
                            HealthStatus::Healthy => {
                                tracing::debug!("System health check: Healthy");
                            }
                            HealthStatus::Degraded(ref msg) => {
                                tracing::warn!("System health check: Degraded - {}", msg);
                            }
                            HealthStatus::Unhealthy(ref msg) => {
                                tracing::error!("System health check: Unhealthy - {}", msg);
                            }
                        },
                        Err(e) => {
                            tracing::error!("Failed to get system health: {}", e);
                        }
                    }
                });
            }
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        tracing::info!("🛑 CoordinatorActor stopping - initiating graceful shutdown");
        Running::Stop
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!("🛑 CoordinatorActor stopped");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

impl Handler<Shutdown> for CoordinatorActor {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) {
        tracing::info!("Received shutdown signal");

        // Stop the feed first so nothing is ingested into a half-stopped system
        if let Some(ref traffic_feed) = self.traffic_feed {
            traffic_feed.do_send(StopActor);
        }

        if let Some(ref dlq_actor) = self.dlq_actor {
            dlq_actor.do_send(StopActor);
        }

        if let Some(ref health_monitor) = self.health_monitor {
            health_monitor.do_send(StopActor);
        }

        ctx.stop();
    }
}

/// Addresses of the children the HTTP layer talks to.
#[derive(MessageResponse)]
pub struct ChildHandles {
    pub dlq_actor: Option<Addr<DlqActor>>,
    pub health_monitor: Option<Addr<HealthMonitorActor>>,
}

#[derive(Message)]
#[rtype(result = "ChildHandles")]
pub struct GetHandles;

impl Handler<GetHandles> for CoordinatorActor {
    type Result = ChildHandles;

    fn handle(&mut self, _: GetHandles, _: &mut Self::Context) -> Self::Result {
        ChildHandles {
            dlq_actor: self.dlq_actor.clone(),
            health_monitor: self.health_monitor.clone(),
        }
    }
}

/// Message to gracefully stop an actor
#[derive(Message)]
#[rtype(result = "()")]
struct StopActor;

impl Handler<StopActor> for TrafficFeedActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("TrafficFeedActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor received stop signal");
        ctx.stop();
    }
}

impl Handler<StopActor> for DlqActor {
    type Result = ();

    fn handle(&mut self, _: StopActor, ctx: &mut Self::Context) {
        tracing::info!("DlqActor received stop signal");
        ctx.stop();
    }
}
