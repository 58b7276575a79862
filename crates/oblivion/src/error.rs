//! Error types for the registry and the inventory client.

use oblivion_core::{Principal, ValidationError};
use oblivion_service::{DenialReason, ServiceError};
use oblivion_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry and client operations.
#[derive(Debug, Error)]
pub enum OblivionError {
    /// The caller already owns a store.
    #[error("store already exists for {0}")]
    AlreadyExists(Principal),

    /// No store, or no item in the store, under the given key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The encryption service rejected an input proof.
    #[error("invalid input proof: {0}")]
    InvalidProof(String),

    /// The encryption service refused to decrypt.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(DenialReason),

    /// The encryption service could not be reached.
    #[error("encryption service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A store or item name is unacceptable.
    #[error("invalid name: {0}")]
    InvalidName(#[from] ValidationError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Any other encryption service failure.
    #[error("service error: {0}")]
    Service(ServiceError),
}

impl OblivionError {
    /// Whether the failed call may succeed if repeated unchanged.
    ///
    /// Only an unreachable encryption service qualifies; every other error
    /// reflects state or input that a retry cannot change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

impl From<ServiceError> for OblivionError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidProof(msg) => Self::InvalidProof(msg),
            ServiceError::Denied(reason) => Self::AuthorizationDenied(reason),
            ServiceError::Unavailable(msg) => Self::ServiceUnavailable(msg),
            other => Self::Service(other),
        }
    }
}

/// Result type for registry and client operations.
pub type Result<T> = std::result::Result<T, OblivionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_taxonomy() {
        assert!(matches!(
            OblivionError::from(ServiceError::Denied(DenialReason::Expired)),
            OblivionError::AuthorizationDenied(DenialReason::Expired)
        ));
        assert!(matches!(
            OblivionError::from(ServiceError::InvalidProof("x".into())),
            OblivionError::InvalidProof(_)
        ));
        assert!(matches!(
            OblivionError::from(ServiceError::Encoding("x".into())),
            OblivionError::Service(_)
        ));
    }

    #[test]
    fn test_only_unavailability_is_retryable() {
        assert!(OblivionError::from(ServiceError::Unavailable("down".into())).is_retryable());
        assert!(!OblivionError::NotFound("store".into()).is_retryable());
        assert!(!OblivionError::AuthorizationDenied(DenialReason::Replayed).is_retryable());
        assert!(!OblivionError::AlreadyExists(Principal::from_bytes([0; 20])).is_retryable());
    }
}
