use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::core::{ComponentHealth, HealthStatus};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitState};

// ============================================================================
// Health Monitor Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Track health status reported by each component
// - Poll the Kafka feed's circuit breaker, when there is one
// - Aggregate system-wide health for the /health endpoint
//
// ============================================================================

const FEED_CHECK_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
    pub details: Option<String>,
}

#[derive(Message)]
#[rtype(result = "SystemHealth")]
pub struct GetSystemHealth;

#[derive(Debug, Clone, Serialize, MessageResponse)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    feed_breaker: Option<CircuitBreaker>,
    metrics: Arc<Metrics>,
}

impl HealthMonitorActor {
    pub fn new(feed_breaker: Option<CircuitBreaker>, metrics: Arc<Metrics>) -> Self {
        Self {
            components: HashMap::new(),
            feed_breaker,
            metrics,
        }
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components = Vec::new();

        for (name, health) in &self.components {
            match &health.status {
                HealthStatus::Unhealthy(msg) => {
                    unhealthy_components.push(format!("{}: {}", name, msg));
                }
                HealthStatus::Degraded(_) => has_degraded = true,
                HealthStatus::Healthy => {}
            }
        }

        if !unhealthy_components.is_empty() {
            unhealthy_components.sort();
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }

    fn check_feed_breaker(&self, ctx: &mut Context<Self>) {
        let Some(breaker) = self.feed_breaker.clone() else {
            return;
        };
        let metrics = self.metrics.clone();
        let addr = ctx.address();

        actix::spawn(async move {
            let state = breaker.state().await;
            metrics.circuit_breaker_state.set(state.as_gauge());

            let status = match state {
                CircuitState::Closed => HealthStatus::Healthy,
                CircuitState::HalfOpen => {
                    HealthStatus::Degraded("Circuit breaker half-open".to_string())
                }
                CircuitState::Open => HealthStatus::Unhealthy("Circuit breaker open".to_string()),
            };

            addr.do_send(UpdateHealth {
                component: "kafka_feed".to_string(),
                status,
                details: None,
            });
        });
    }
}

impl Actor for HealthMonitorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("HealthMonitorActor started");

        if self.feed_breaker.is_some() {
            ctx.run_interval(FEED_CHECK_INTERVAL, |act, ctx| act.check_feed_breaker(ctx));
        }
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Handler<UpdateHealth> for HealthMonitorActor {
    type Result = ();

    fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Self::Context) {
        tracing::debug!(
            component = %msg.component,
            status = ?msg.status,
            "Updated component health"
        );

        let health = ComponentHealth::new(msg.component.clone(), msg.status).with_details(msg.details);
        self.components.insert(msg.component, health);
    }
}

impl Handler<GetSystemHealth> for HealthMonitorActor {
    type Result = SystemHealth;

    fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Self::Context) -> Self::Result {
        SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> Addr<HealthMonitorActor> {
        HealthMonitorActor::new(None, Arc::new(Metrics::new().unwrap())).start()
    }

    fn update(component: &str, status: HealthStatus) -> UpdateHealth {
        UpdateHealth {
            component: component.to_string(),
            status,
            details: None,
        }
    }

    #[actix::test]
    async fn test_all_healthy() {
        let monitor = monitor();
        monitor.send(update("dlq_actor", HealthStatus::Healthy)).await.unwrap();
        monitor.send(update("traffic_feed", HealthStatus::Healthy)).await.unwrap();

        let health = monitor.send(GetSystemHealth).await.unwrap();
        assert!(health.overall_status.is_healthy());
        assert_eq!(health.components.len(), 2);
    }

    #[actix::test]
    async fn test_worst_status_wins() {
        let monitor = monitor();
        monitor.send(update("dlq_actor", HealthStatus::Healthy)).await.unwrap();
        monitor
            .send(update("kafka_feed", HealthStatus::Degraded("half-open".into())))
            .await
            .unwrap();

        let health = monitor.send(GetSystemHealth).await.unwrap();
        assert!(matches!(health.overall_status, HealthStatus::Degraded(_)));

        monitor
            .send(update("kafka_feed", HealthStatus::Unhealthy("Circuit breaker open".into())))
            .await
            .unwrap();
        let health = monitor.send(GetSystemHealth).await.unwrap();
        assert_eq!(
            health.overall_status,
            HealthStatus::Unhealthy("kafka_feed: Circuit breaker open".to_string())
        );
    }

    #[test]
    fn test_component_health_json_shape() {
        let health = ComponentHealth::new("kafka_feed", HealthStatus::Degraded("slow".into()));
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reason"], "slow");
        assert!(json.get("details").is_none());
    }
}
