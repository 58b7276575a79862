//! # Oblivion ACL
//!
//! Access-control grants on ciphertext handles, and the symmetric and
//! key-agreement primitives used to move plaintext to an authorized reader.
//!
//! ## Overview
//!
//! Every handle written into a store carries a set of principals allowed to
//! request its decryption. Grants are created as a side effect of store
//! writes and are never revoked: the set only grows.
//!
//! ## Key Concepts
//!
//! - **AclGrant**: `(handle, principal)` meaning "principal may decrypt handle"
//! - **AclRegistry**: Append-only grant set keyed by handle
//! - **EncryptedPayload**: ChaCha20-Poly1305 ciphertext bound to associated data
//! - **SealedEnvelope**: Payload sealed to an ephemeral X25519 key for transit
//!
//! ## Transit Model
//!
//! The requester generates an ephemeral X25519 keypair per decrypt attempt.
//! The service generates its own ephemeral key, derives a transit key from
//! both public halves, and seals the result with the authorization digest as
//! associated data. Only the holder of the requester's ephemeral secret can
//! open it, and only once.

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod grant;
pub mod registry;

pub use crypto::{EncryptionKey, EncryptionNonce, EphemeralKeyPair, SharedKey, X25519PublicKey};
pub use envelope::{EncryptedPayload, EncryptionFormat, SealedEnvelope};
pub use error::{AclError, Result};
pub use grant::AclGrant;
pub use registry::AclRegistry;
