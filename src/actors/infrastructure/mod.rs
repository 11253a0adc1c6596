// ============================================================================
// Infrastructure Actors
// ============================================================================
//
// - Traffic feed (simulated or Kafka) into the aggregation engine
// - Dead letter queue for rejected messages
// - Health monitoring
// - Coordination and supervision
//
// ============================================================================

// Private module declarations
mod coordinator;
mod dlq;
mod health_monitor;
mod traffic_feed;

// Re-export for public API
pub use coordinator::{ChildHandles, CoordinatorActor, GetHandles, Shutdown};
pub use dlq::{AddToDlq, DlqActor, DlqMessage, DlqStats, GetDlqMessages, GetDlqStats};
pub use health_monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
pub use traffic_feed::{IngestMessage, IngestPayload, TrafficFeedActor};
