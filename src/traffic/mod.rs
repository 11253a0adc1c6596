// ============================================================================
// Store Traffic Domain
// ============================================================================
//
// - Models (CustomerMessage, LiveSnapshot, HourBucket, HourKey)
// - Errors (TrafficError)
// - Engine (AggregationEngine: live counters + hourly rollups)
// - Hub (ingest-then-broadcast handle shared by feed and API)
//
// ============================================================================

pub mod engine;
pub mod errors;
pub mod hub;
pub mod models;

pub use engine::{AggregationEngine, EngineStats, Retention};
pub use errors::TrafficError;
pub use hub::{Subscription, TrafficHub};
pub use models::*;
