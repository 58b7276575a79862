//! # Oblivion Core
//!
//! Pure primitives for Oblivion: principals, ciphertext handles, identity
//! keys and the signed decryption authorization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over identifiers and signatures.
//!
//! ## Key Types
//!
//! - [`Principal`] - Address-like identity that owns stores and holds grants
//! - [`CiphertextHandle`] - Opaque fixed-width reference to an encrypted value
//! - [`ContractId`] - Scope identifier a handle was registered under
//! - [`DecryptionAuthorization`] - Signed, time-bounded request to decrypt handles
//!
//! ## Typed Data
//!
//! Authorizations are signed over a domain-separated digest. See [`typed_data`].

pub mod authorization;
pub mod crypto;
pub mod error;
pub mod time;
pub mod typed_data;
pub mod types;
pub mod validation;

pub use authorization::{
    AuthorizationMessage, DecryptionAuthorization, DEFAULT_VALIDITY_SECS, MAX_VALIDITY_SECS,
};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, ValidationError};
pub use time::{Clock, ManualClock, SystemClock};
pub use typed_data::TypedDataDomain;
pub use types::{CiphertextHandle, ContractId, EncryptedInput, InputProof, Principal};
pub use validation::{validate_authorization, validate_item_name, validate_store_name};
