use actix::prelude::*;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod api;
mod config;
mod messaging;
mod metrics;
mod traffic;
mod utils;

use actors::{CoordinatorActor, GetHandles, Shutdown};
use api::ApiState;
use config::Config;
use traffic::{AggregationEngine, TrafficHub};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,store_traffic=debug"))
        )
        .init();

    tracing::info!("🚀 Starting store traffic aggregation service");

    // === 1. Configuration ===
    let config = Config::from_env()?;
    tracing::info!(
        feed = config.feed.label(),
        http_port = config.http_port,
        metrics_port = config.metrics_port,
        retention = ?config.retention,
        "Loaded configuration"
    );

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Aggregation engine, shared through the hub ===
    let engine = Arc::new(AggregationEngine::new(config.retention));
    let hub = TrafficHub::new(engine, config.broadcast_capacity);

    // === 4. Coordinator starts the feed, DLQ and health monitor ===
    let coordinator = CoordinatorActor::new(config.clone(), hub.clone(), metrics.clone()).start();
    let handles = coordinator.send(GetHandles).await?;
    let (Some(dlq_actor), Some(health_monitor)) = (handles.dlq_actor, handles.health_monitor) else {
        anyhow::bail!("Coordinator did not start its child actors");
    };

    // === 5. HTTP servers; both stop on SIGINT/SIGTERM ===
    let api = api::api_server(
        ApiState {
            hub,
            metrics: metrics.clone(),
            dlq_actor,
            health_monitor,
        },
        &config.http_host,
        config.http_port,
    )?;
    let metrics_server = metrics::metrics_server(
        metrics.registry().clone(),
        &config.http_host,
        config.metrics_port,
    )?;

    futures_util::future::try_join(api, metrics_server).await?;

    // === 6. Graceful shutdown ===
    tracing::info!("HTTP servers stopped, shutting down actors");
    coordinator.send(Shutdown).await?;

    tracing::info!("👋 Shutdown complete");
    Ok(())
}
