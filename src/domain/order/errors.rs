use uuid::Uuid;

use super::value_objects::OrderStatus;
use crate::store::StoreError;

// ============================================================================
// Service Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status transition from {from} to {to}")]
    StateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Warranty cannot be applied: {0}")]
    Eligibility(String),

    #[error("Service order not found: {0}")]
    NotFound(Uuid),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Event cannot be applied: {0}")]
    InvalidEvent(String),

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrderError::Validation(message.into())
    }

    pub fn eligibility(message: impl Into<String>) -> Self {
        OrderError::Eligibility(message.into())
    }

    /// Stable machine-readable code for the caller-facing envelope
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "VALIDATION_ERROR",
            OrderError::StateTransition { .. } => "STATE_TRANSITION_ERROR",
            OrderError::Eligibility(_) => "ELIGIBILITY_ERROR",
            OrderError::NotFound(_) => "NOT_FOUND",
            OrderError::Persistence(_) => "PERSISTENCE_ERROR",
            OrderError::InvalidEvent(_) | OrderError::NotInitialized => "INTERNAL_ERROR",
        }
    }

    pub fn details(&self) -> String {
        match self {
            OrderError::StateTransition { from, .. } => {
                let allowed: Vec<&str> = from.allowed_targets().iter().map(|s| s.as_str()).collect();
                format!("{} (allowed from {}: {})", self.code(), from, allowed.join(", "))
            }
            _ => self.code().to_string(),
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_details_list_allowed_targets() {
        let err = OrderError::StateTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Delivered,
        };

        assert_eq!(err.to_string(), "Invalid status transition from CANCELLED to DELIVERED");
        assert_eq!(
            err.details(),
            "STATE_TRANSITION_ERROR (allowed from CANCELLED: CANCELLED, PENDING, PREORDER)"
        );
    }

    #[test]
    fn test_store_errors_map_to_domain_errors() {
        let id = Uuid::new_v4();
        assert_eq!(OrderError::from(StoreError::NotFound(id)), OrderError::NotFound(id));

        let conflict = OrderError::from(StoreError::ConcurrencyConflict { expected: 2, actual: 3 });
        assert_eq!(conflict.code(), "PERSISTENCE_ERROR");
    }
}
