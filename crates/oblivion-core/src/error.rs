//! Error types for Oblivion Core.

use thiserror::Error;

/// Failures decoding identifiers or checking signatures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The signature does not verify for this key and message.
    #[error("signature does not verify")]
    InvalidSignature,

    /// The bytes are not a valid Ed25519 point.
    #[error("not a valid ed25519 public key")]
    InvalidPublicKey,

    #[error("malformed hex: {0}")]
    InvalidHex(String),

    /// A typed-data value has no canonical encoding.
    #[error("no canonical encoding for {0}")]
    NonCanonical(&'static str),
}

impl From<hex::FromHexError> for CoreError {
    fn from(e: hex::FromHexError) -> Self {
        CoreError::InvalidHex(e.to_string())
    }
}

/// A name or authorization that breaks a structural limit.
///
/// Checked before any state is read, so these never depend on who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("item name must not be empty")]
    EmptyItemName,

    #[error("{kind} name is {len} bytes, limit is {max}")]
    NameTooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    #[error("authorization names {count} handles, limit is {max}")]
    TooManyHandles { count: usize, max: usize },

    #[error("authorization has an empty contract scope")]
    EmptyScope,

    #[error("authorization validity window is zero")]
    ZeroValidity,

    #[error("authorization validity of {secs}s exceeds limit of {max}s")]
    ValidityTooLong { secs: u64, max: u64 },

    #[error("authorization issued at {issued_at}, after current time {now}")]
    IssuedInFuture { issued_at: u64, now: u64 },
}
