//! Decryption authorizations.
//!
//! A [`DecryptionAuthorization`] is a signed, time-bounded, scope-bound
//! request to decrypt a specific set of ciphertext handles. It names an
//! ephemeral X25519 public key under which the service seals the plaintext,
//! and is signed by the requester's long-term identity key over a
//! [`TypedDataDomain`] digest.
//!
//! ## Lifecycle
//!
//! 1. The requester composes an [`AuthorizationMessage`]
//! 2. [`AuthorizationMessage::sign`] produces the authorization
//! 3. The encryption service verifies, checks grants, and consumes it once
//! 4. It expires at `issued_at + validity_secs` regardless of use

use ciborium::value::Value;
use serde::{Deserialize, Serialize};

use crate::crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair};
use crate::error::CoreError;
use crate::typed_data::{struct_hash, TypedDataDomain};
use crate::types::{CiphertextHandle, ContractId, Principal};

/// Default validity window: seven days.
pub const DEFAULT_VALIDITY_SECS: u64 = 7 * 24 * 60 * 60;

/// Longest validity window a service accepts: one year.
pub const MAX_VALIDITY_SECS: u64 = 365 * 24 * 60 * 60;

/// Type name mixed into the struct hash.
pub const AUTHORIZATION_TYPE: &str = "UserDecryptRequest";

/// The structured message a requester signs.
///
/// Handles and scope are kept sorted and deduplicated so that the same
/// request always hashes the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationMessage {
    /// Ephemeral X25519 public key the plaintext is sealed to.
    pub public_key: [u8; 32],
    /// Handles the requester wants decrypted.
    pub handles: Vec<CiphertextHandle>,
    /// Contract scopes the handles belong to.
    pub contract_scope: Vec<ContractId>,
    /// Issuance time (Unix seconds).
    pub issued_at: u64,
    /// Validity window in seconds.
    pub validity_secs: u64,
}

impl AuthorizationMessage {
    /// Compose a message, normalizing handle and scope order.
    pub fn new(
        public_key: [u8; 32],
        handles: impl IntoIterator<Item = CiphertextHandle>,
        contract_scope: impl IntoIterator<Item = ContractId>,
        issued_at: u64,
        validity_secs: u64,
    ) -> Self {
        let mut handles: Vec<CiphertextHandle> = handles.into_iter().collect();
        handles.sort();
        handles.dedup();

        let mut contract_scope: Vec<ContractId> = contract_scope.into_iter().collect();
        contract_scope.sort();
        contract_scope.dedup();

        Self {
            public_key,
            handles,
            contract_scope,
            issued_at,
            validity_secs,
        }
    }

    /// When this message stops being acceptable (Unix seconds).
    pub fn expires_at(&self) -> u64 {
        self.issued_at.saturating_add(self.validity_secs)
    }

    /// Hash of the message as a typed struct.
    pub fn struct_hash(&self) -> Result<Blake3Hash, CoreError> {
        let handles = self.handles.iter().map(|h| Value::Bytes(h.0.to_vec())).collect();
        let scope = self
            .contract_scope
            .iter()
            .map(|c| Value::Bytes(c.0.to_vec()))
            .collect();

        struct_hash(
            AUTHORIZATION_TYPE,
            vec![
                Value::Bytes(self.public_key.to_vec()),
                Value::Array(handles),
                Value::Array(scope),
                Value::Integer(self.issued_at.into()),
                Value::Integer(self.validity_secs.into()),
            ],
        )
    }

    /// The digest signed in the given domain.
    pub fn digest(&self, domain: &TypedDataDomain) -> Result<Blake3Hash, CoreError> {
        domain.signing_digest(&self.struct_hash()?)
    }

    /// Sign the message with a long-term identity key.
    pub fn sign(
        self,
        identity: &Keypair,
        domain: &TypedDataDomain,
    ) -> Result<DecryptionAuthorization, CoreError> {
        let digest = self.digest(domain)?;
        let signature = identity.sign(digest.as_bytes());
        Ok(DecryptionAuthorization {
            message: self,
            signer: identity.public_key(),
            signature,
        })
    }
}

/// A signed decryption authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    /// The signed message.
    pub message: AuthorizationMessage,
    /// Identity key that produced the signature.
    pub signer: Ed25519PublicKey,
    /// Signature over the typed-data digest.
    pub signature: Ed25519Signature,
}

impl DecryptionAuthorization {
    /// The principal this authorization speaks for.
    pub fn requester(&self) -> Principal {
        self.signer.principal()
    }

    /// The digest this authorization was signed over.
    pub fn digest(&self, domain: &TypedDataDomain) -> Result<Blake3Hash, CoreError> {
        self.message.digest(domain)
    }

    /// Verify the signature in the given domain.
    pub fn verify(&self, domain: &TypedDataDomain) -> Result<(), CoreError> {
        let digest = self.digest(domain)?;
        self.signer.verify(digest.as_bytes(), &self.signature)
    }

    /// Whether the validity window has lapsed at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.message.expires_at()
    }

    /// Whether the authorization's scope covers a contract.
    pub fn covers_scope(&self, contract: &ContractId) -> bool {
        self.message.contract_scope.binary_search(contract).is_ok()
    }

    /// Handles requested.
    pub fn handles(&self) -> &[CiphertextHandle] {
        &self.message.handles
    }

    /// Ephemeral public key the result is sealed to.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.message.public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> TypedDataDomain {
        TypedDataDomain::decryption(ContractId::derive("test-service"))
    }

    fn message(issued_at: u64) -> AuthorizationMessage {
        AuthorizationMessage::new(
            [9u8; 32],
            vec![
                CiphertextHandle::from_bytes([2; 32]),
                CiphertextHandle::from_bytes([1; 32]),
                CiphertextHandle::from_bytes([2; 32]),
            ],
            vec![ContractId::derive("store")],
            issued_at,
            DEFAULT_VALIDITY_SECS,
        )
    }

    #[test]
    fn test_message_normalizes_handles() {
        let msg = message(0);
        assert_eq!(
            msg.handles,
            vec![
                CiphertextHandle::from_bytes([1; 32]),
                CiphertextHandle::from_bytes([2; 32]),
            ]
        );
    }

    #[test]
    fn test_sign_verify() {
        let identity = Keypair::generate();
        let auth = message(1_000).sign(&identity, &domain()).unwrap();

        auth.verify(&domain()).expect("fresh authorization should verify");
        assert_eq!(auth.requester(), identity.principal());
    }

    #[test]
    fn test_signature_bound_to_domain() {
        let identity = Keypair::generate();
        let auth = message(1_000).sign(&identity, &domain()).unwrap();
        let other = TypedDataDomain::decryption(ContractId::derive("other-service"));

        assert!(auth.verify(&other).is_err());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let identity = Keypair::generate();
        let mut auth = message(1_000).sign(&identity, &domain()).unwrap();
        auth.message.validity_secs = MAX_VALIDITY_SECS;

        assert!(auth.verify(&domain()).is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let identity = Keypair::generate();
        let auth = message(1_000).sign(&identity, &domain()).unwrap();
        let expires = 1_000 + DEFAULT_VALIDITY_SECS;

        assert!(!auth.is_expired(expires));
        assert!(auth.is_expired(expires + 1));
    }

    #[test]
    fn test_covers_scope() {
        let identity = Keypair::generate();
        let auth = message(0).sign(&identity, &domain()).unwrap();

        assert!(auth.covers_scope(&ContractId::derive("store")));
        assert!(!auth.covers_scope(&ContractId::derive("elsewhere")));
    }
}
