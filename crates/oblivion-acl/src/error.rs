//! Error types for the ACL module.

use thiserror::Error;

/// Errors from sealing and opening ciphertexts.
#[derive(Debug, Error)]
pub enum AclError {
    /// The AEAD refused to encrypt.
    #[error("seal failed: {0}")]
    Seal(String),

    /// Wrong key, wrong associated data, or tampered ciphertext.
    #[error("open failed: ciphertext or associated data did not authenticate")]
    Open,

    /// The peer's X25519 key produced an all-zero shared secret.
    #[error("key agreement was not contributory")]
    WeakKeyAgreement,

    /// A payload could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Result type for ACL operations.
pub type Result<T> = std::result::Result<T, AclError>;
