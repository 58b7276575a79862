//! Error types for the encryption service and the decryption protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::SessionState;

/// Why the service refused a decryption request.
///
/// `Unauthorized` is returned both for handles the requester has no grant on
/// and for handles that do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenialReason {
    /// The signature does not verify, or the signer is not the requester.
    BadSignature,
    /// At least one handle is not granted to the requester.
    Unauthorized,
    /// The validity window has lapsed.
    Expired,
    /// The authorization was already consumed.
    Replayed,
    /// A handle belongs to a contract outside the authorization's scope.
    ScopeMismatch,
    /// The request is structurally unacceptable.
    Malformed,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BadSignature => "bad signature",
            Self::Unauthorized => "unauthorized",
            Self::Expired => "expired",
            Self::Replayed => "replayed",
            Self::ScopeMismatch => "scope mismatch",
            Self::Malformed => "malformed request",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during service and protocol operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The input proof does not attest the claimed handle.
    #[error("invalid input proof: {0}")]
    InvalidProof(String),

    /// The decryption request was refused.
    #[error("decryption denied: {0}")]
    Denied(DenialReason),

    /// The service could not be reached. Retrying may succeed.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// A session step was taken out of order.
    #[error("session step out of order: expected {expected:?}, found {found:?}")]
    OutOfOrder {
        expected: SessionState,
        found: SessionState,
    },

    /// Encoding or decoding of service material failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Storage error.
    #[error("store error: {0}")]
    Store(#[from] oblivion_store::StoreError),

    /// Sealing or opening failed.
    #[error("envelope error: {0}")]
    Envelope(#[from] oblivion_acl::AclError),
}

impl ServiceError {
    /// Whether the same call might succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<oblivion_core::CoreError> for ServiceError {
    fn from(e: oblivion_core::CoreError) -> Self {
        ServiceError::Encoding(e.to_string())
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
