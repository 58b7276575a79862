//! The encryption service contract.
//!
//! The service is the trusted oracle of the system: it encrypts inputs,
//! attests their provenance, and decrypts handles for principals that prove
//! they hold a grant. The registry talks to it only through this trait.

use std::sync::Arc;

use async_trait::async_trait;

use oblivion_core::{
    CiphertextHandle, ContractId, EncryptedInput, InputProof, Principal, TypedDataDomain,
};

use crate::error::Result;
use crate::messages::{DecryptRequest, DecryptResponse};

/// Encrypts quantities, admits them with a proof, and decrypts them for
/// principals holding a grant.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// The domain decryption authorizations must be signed in.
    fn domain(&self) -> TypedDataDomain;

    /// Encrypt a 32-bit quantity for `submitter` to write under `scope`.
    async fn encrypt_input(
        &self,
        value: u32,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<EncryptedInput>;

    /// Check that `proof` attests `handle` for `(submitter, scope)` and admit
    /// the handle into persistent state.
    ///
    /// Fails with `InvalidProof` on any mismatch. Registering an admitted
    /// handle again returns the same handle.
    async fn validate_and_register(
        &self,
        handle: &CiphertextHandle,
        proof: &InputProof,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<CiphertextHandle>;

    /// Decrypt handles under a signed authorization.
    ///
    /// Fails with `Denied` if any check fails; no partial results are
    /// returned.
    async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse>;
}

#[async_trait]
impl<S: EncryptionService + ?Sized> EncryptionService for Arc<S> {
    fn domain(&self) -> TypedDataDomain {
        (**self).domain()
    }

    async fn encrypt_input(
        &self,
        value: u32,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<EncryptedInput> {
        (**self).encrypt_input(value, submitter, scope).await
    }

    async fn validate_and_register(
        &self,
        handle: &CiphertextHandle,
        proof: &InputProof,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<CiphertextHandle> {
        (**self)
            .validate_and_register(handle, proof, submitter, scope)
            .await
    }

    async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse> {
        (**self).decrypt(request).await
    }
}
