//! Error types for Synapse
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

/// Result type alias using SynapseError
pub type Result<T> = std::result::Result<T, SynapseError>;

/// Unified error type for Synapse operations
#[derive(Debug, Error)]
pub enum SynapseError {
    // Affinity invariants
    #[error("Consistency violation: {0}")]
    Consistency(#[from] ConsistencyError),

    // Lifecycle provisioning
    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Lookup misses that the caller asked for explicitly
    #[error("Not found: {0}")]
    NotFound(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl SynapseError {
    /// Transient failures that callers degrade to a neutral result instead of surfacing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SynapseError::Network(_) | SynapseError::Timeout(_) | SynapseError::Storage(_)
        )
    }
}

/// Affinity edge invariant violations, rejected at the ledger write boundary
#[derive(Debug, Error, PartialEq)]
pub enum ConsistencyError {
    #[error("Counter mismatch: usage {usage} != success {success} + failure {failure}")]
    CounterMismatch {
        usage: u64,
        success: u64,
        failure: u64,
    },

    #[error("Weight {0} outside [0, 1]")]
    WeightOutOfRange(f64),

    #[error("Success rate {actual} does not match counters (expected {expected})")]
    SuccessRateDrift { expected: f64, actual: f64 },

    #[error("Rate {0} outside [0, 1]")]
    InvalidRate(f64),
}

/// Lifecycle provisioner failures
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Provisioner rejected request: {0}")]
    Rejected(String),

    #[error("Provisioner unavailable: {0}")]
    Unavailable(String),

    #[error("Provisioned agent reported status {status}")]
    NotReady { status: String },
}

impl From<serde_json::Error> for SynapseError {
    fn from(err: serde_json::Error) -> Self {
        SynapseError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SynapseError {
    fn from(err: std::io::Error) -> Self {
        SynapseError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for SynapseError {
    fn from(err: anyhow::Error) -> Self {
        SynapseError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for SynapseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SynapseError::Timeout(err.to_string())
        } else if err.is_decode() {
            SynapseError::Serialization(err.to_string())
        } else {
            SynapseError::Network(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for SynapseError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        SynapseError::Timeout(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SynapseError::Consistency(ConsistencyError::CounterMismatch {
            usage: 3,
            success: 1,
            failure: 1,
        });
        assert!(err.to_string().contains("usage 3"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(SynapseError::Network("down".into()).is_transient());
        assert!(SynapseError::Timeout("slow".into()).is_transient());
        assert!(!SynapseError::Consistency(ConsistencyError::WeightOutOfRange(1.5)).is_transient());
        assert!(!SynapseError::NotFound("agent".into()).is_transient());
    }
}
