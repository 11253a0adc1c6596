// ============================================================================
// HTTP Query API
// ============================================================================
//
// Read-only endpoints over the aggregation engine, the live traffic stream
// (server-sent events) and operational views (health, dead letters).
//
// ============================================================================

mod routes;
mod stream;

use actix::Addr;
use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use crate::actors::{DlqActor, HealthMonitorActor};
use crate::metrics::Metrics;
use crate::traffic::TrafficHub;

pub use routes::configure;

/// Everything the handlers need, shared across workers.
#[derive(Clone)]
pub struct ApiState {
    pub hub: TrafficHub,
    pub metrics: Arc<Metrics>,
    pub dlq_actor: Addr<DlqActor>,
    pub health_monitor: Addr<HealthMonitorActor>,
}

/// Any origin may read the API; every route is a GET.
fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(["GET"])
        .allow_any_header()
        .send_wildcard()
        .max_age(3600)
}

/// Build the API server; the caller drives it.
pub fn api_server(state: ApiState, host: &str, port: u16) -> std::io::Result<Server> {
    tracing::info!("🌐 Starting traffic API on http://{}:{}", host, port);

    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
