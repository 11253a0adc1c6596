// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure around the aggregation engine.
//
// Structure:
// - core/           - Health types shared by the actors
// - infrastructure/ - Feed, DLQ, health monitor and coordinator actors
//
// Note: aggregation itself is plain synchronous code in `traffic`; actors
//       only drive I/O and scheduling.
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

pub use self::core::HealthStatus;
pub use infrastructure::*;
