//! # Oblivion Service
//!
//! The encryption service contract and the user-decryption protocol.
//!
//! ## Key Types
//!
//! - [`EncryptionService`] - The async trait the registry and clients call
//! - [`LocalEncryptionService`] - In-process service over a ledger and vault
//! - [`UserDecryptSession`] - Client-side state machine for one decryption
//! - [`DenialReason`] - Why a decryption request was refused
//!
//! ## Protocol
//!
//! 1. The requester generates an ephemeral X25519 keypair
//! 2. It composes an authorization naming handles, contract scope and a
//!    validity window, and signs its typed-data digest with its identity key
//! 3. The service checks the signature, every handle's grant, the scope, the
//!    window and that the authorization was not used before
//! 4. Plaintexts come back sealed to the ephemeral key and are opened locally
//!
//! ## Design Notes
//!
//! - **No partial answers**: one failing handle denies the whole request
//! - **No existence oracle**: unknown handles are denied as `Unauthorized`
//! - **Single use**: a consumed authorization is denied as `Replayed`

pub mod error;
pub mod local;
pub mod messages;
pub mod protocol;
pub mod service;

pub use error::{DenialReason, Result, ServiceError};
pub use local::LocalEncryptionService;
pub use messages::{DecryptRequest, DecryptResponse, DecryptedValues, PROTOCOL_VERSION};
pub use protocol::{SessionState, UserDecryptSession};
pub use service::EncryptionService;
