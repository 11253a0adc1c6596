use super::models::StoreId;

// ============================================================================
// Traffic Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("Malformed timestamp {value:?}: {reason}")]
    MalformedInput { value: String, reason: String },

    #[error("Invalid customer message payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Customer counts for store {store_id} overflow: {field}")]
    CountOverflow { store_id: StoreId, field: &'static str },

    #[error("Store not found: {0}")]
    NotFound(StoreId),
}

impl TrafficError {
    pub fn malformed(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Short label for metrics and dead letters.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed_timestamp",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::CountOverflow { .. } => "count_overflow",
            Self::NotFound(_) => "not_found",
        }
    }
}
