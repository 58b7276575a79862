//! An in-process encryption service.
//!
//! [`LocalEncryptionService`] realises the service contract with real
//! cryptography so the protocol can be exercised end to end:
//!
//! - Quantities are sealed at rest with ChaCha20-Poly1305 under a key derived
//!   from the service seed, bound to their handle as associated data.
//! - Input proofs are Ed25519 attestations by the service over
//!   `(handle, submitter, scope)`.
//! - Responses are sealed to the requester's ephemeral X25519 key and bound
//!   to the authorization digest.
//!
//! Grants are read from the [`Ledger`] the registry writes, and ciphertext
//! material lives in a [`CiphertextVault`]; the two may be the same database.

use async_trait::async_trait;
use rand::RngCore;
use tracing::{debug, info, warn};

use oblivion_acl::{EncryptedPayload, EncryptionKey, SealedEnvelope, X25519PublicKey};
use oblivion_core::{
    validate_authorization, Blake3Hash, CiphertextHandle, Clock, ContractId, Ed25519PublicKey,
    Ed25519Signature, EncryptedInput, InputProof, Keypair, Principal, SystemClock,
    TypedDataDomain,
};
use oblivion_store::{CiphertextRecord, CiphertextVault, Ledger};

use crate::error::{DenialReason, Result, ServiceError};
use crate::messages::{
    encode_values, DecryptRequest, DecryptResponse, DecryptedValues, PROTOCOL_VERSION,
};
use crate::service::EncryptionService;

const ATTESTATION_KEY_CONTEXT: &str = "oblivion 2024 service attestation key v1";
const VALUE_KEY_CONTEXT: &str = "oblivion 2024 service value key v1";
const HANDLE_CONTEXT: &str = "oblivion 2024 ciphertext handle v1";
const PROOF_CONTEXT: &str = "oblivion 2024 input proof v1";
const VERIFIER_CONTEXT: &str = "oblivion 2024 decryption verifier v1";

/// How long an encrypted input may wait for registration: one day.
///
/// Older unregistered inputs are refused and pruned from the vault.
pub const UNREGISTERED_TTL_SECS: u64 = 24 * 60 * 60;

/// A local encryption service backed by a ledger and a vault.
pub struct LocalEncryptionService<L, V, C = SystemClock> {
    /// Key that signs input proofs.
    attestation: Keypair,
    /// Seals quantities at rest.
    value_key: EncryptionKey,
    /// Identifier this service verifies authorizations under.
    verifying_contract: ContractId,
    /// Grant lookups.
    acl: L,
    /// Ciphertext material and spent authorizations.
    vault: V,
    /// Time source for validity windows.
    clock: C,
}

impl<L: Ledger, V: CiphertextVault, C: Clock> LocalEncryptionService<L, V, C> {
    /// Create a service whose keys are all derived from `seed`.
    ///
    /// The same seed over the same vault reproduces the same service.
    pub fn new(seed: &[u8; 32], acl: L, vault: V, clock: C) -> Self {
        let attestation = Keypair::from_seed(&blake3::derive_key(ATTESTATION_KEY_CONTEXT, seed));
        let value_key = EncryptionKey::derive(VALUE_KEY_CONTEXT, seed);

        let verifier = Blake3Hash::derive(VERIFIER_CONTEXT, attestation.public_key().as_bytes());
        let mut contract = [0u8; 20];
        contract.copy_from_slice(&verifier.as_bytes()[..20]);

        Self {
            attestation,
            value_key,
            verifying_contract: ContractId::from_bytes(contract),
            acl,
            vault,
            clock,
        }
    }

    /// Public half of the key that signs input proofs.
    pub fn attestation_key(&self) -> Ed25519PublicKey {
        self.attestation.public_key()
    }

    /// Identifier this service verifies authorizations under.
    pub fn verifying_contract(&self) -> ContractId {
        self.verifying_contract
    }

    fn seal_value(&self, handle: &CiphertextHandle, value: u32) -> Result<Vec<u8>> {
        let payload =
            EncryptedPayload::encrypt(&value.to_le_bytes(), &self.value_key, handle.as_bytes())?;
        Ok(payload.to_bytes()?)
    }

    fn open_value(&self, record: &CiphertextRecord) -> Result<u32> {
        let payload = EncryptedPayload::from_bytes(&record.payload)?;
        let bytes = payload.decrypt(&self.value_key, record.handle.as_bytes())?;
        let bytes: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            ServiceError::Encoding(format!("expected 4-byte value, got {}", bytes.len()))
        })?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn denied(&self, requester: &Principal, reason: DenialReason) -> ServiceError {
        warn!(requester = %requester, %reason, "decryption denied");
        ServiceError::Denied(reason)
    }

    /// Run every check on a request. Nothing is consumed on failure.
    async fn admit(&self, request: &DecryptRequest, now: u64) -> Result<Vec<CiphertextRecord>> {
        let auth = &request.authorization;
        let requester = &request.requester;

        if request.protocol_version != PROTOCOL_VERSION {
            return Err(self.denied(requester, DenialReason::Malformed));
        }
        if let Err(e) = validate_authorization(auth, now) {
            debug!(error = %e, "authorization failed validation");
            return Err(self.denied(requester, DenialReason::Malformed));
        }
        if request
            .handles
            .iter()
            .any(|h| auth.handles().binary_search(h).is_err())
        {
            return Err(self.denied(requester, DenialReason::Malformed));
        }

        if auth.verify(&self.domain()).is_err() || auth.requester() != *requester {
            return Err(self.denied(requester, DenialReason::BadSignature));
        }

        if auth.is_expired(now) {
            return Err(self.denied(requester, DenialReason::Expired));
        }

        let mut records = Vec::with_capacity(request.handles.len());
        for handle in &request.handles {
            // Missing and ungranted handles are reported the same way.
            if !self.acl.is_authorized(handle, requester).await? {
                return Err(self.denied(requester, DenialReason::Unauthorized));
            }
            let record = match self.vault.get_ciphertext(handle).await? {
                Some(record) if record.registered => record,
                _ => return Err(self.denied(requester, DenialReason::Unauthorized)),
            };
            if !auth.covers_scope(&record.scope) {
                return Err(self.denied(requester, DenialReason::ScopeMismatch));
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn proof_digest(
    handle: &CiphertextHandle,
    submitter: &Principal,
    scope: &ContractId,
) -> Blake3Hash {
    let mut material = Vec::with_capacity(72);
    material.extend_from_slice(handle.as_bytes());
    material.extend_from_slice(submitter.as_bytes());
    material.extend_from_slice(scope.as_bytes());
    Blake3Hash::derive(PROOF_CONTEXT, &material)
}

#[async_trait]
impl<L, V, C> EncryptionService for LocalEncryptionService<L, V, C>
where
    L: Ledger,
    V: CiphertextVault,
    C: Clock,
{
    fn domain(&self) -> TypedDataDomain {
        TypedDataDomain::decryption(self.verifying_contract)
    }

    async fn encrypt_input(
        &self,
        value: u32,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<EncryptedInput> {
        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
        hasher.update(&nonce);
        hasher.update(scope.as_bytes());
        hasher.update(submitter.as_bytes());
        let handle = CiphertextHandle::from_bytes(*hasher.finalize().as_bytes());

        let now = self.clock.now();
        let pruned = self
            .vault
            .prune_unregistered(now.saturating_sub(UNREGISTERED_TTL_SECS))
            .await?;
        if pruned > 0 {
            debug!(pruned, "dropped stale unregistered inputs");
        }

        let record = CiphertextRecord {
            handle,
            submitter: *submitter,
            scope: *scope,
            payload: self.seal_value(&handle, value)?,
            registered: false,
            created_at: now,
        };
        self.vault.put_ciphertext(&record).await?;

        let signature = self
            .attestation
            .sign(proof_digest(&handle, submitter, scope).as_bytes());

        debug!(%handle, %submitter, "encrypted input");
        Ok(EncryptedInput {
            handle,
            proof: InputProof::new(signature.as_bytes().to_vec()),
        })
    }

    async fn validate_and_register(
        &self,
        handle: &CiphertextHandle,
        proof: &InputProof,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<CiphertextHandle> {
        let signature: [u8; 64] = proof.as_bytes().try_into().map_err(|_| {
            ServiceError::InvalidProof(format!("expected 64-byte proof, got {}", proof.len()))
        })?;

        let digest = proof_digest(handle, submitter, scope);
        if self
            .attestation
            .public_key()
            .verify(digest.as_bytes(), &Ed25519Signature::from_bytes(signature))
            .is_err()
        {
            warn!(%handle, %submitter, "input proof rejected");
            return Err(ServiceError::InvalidProof(
                "proof does not attest this handle for this submitter and scope".into(),
            ));
        }

        let now = self.clock.now();
        let record = self
            .vault
            .get_ciphertext(handle)
            .await?
            .filter(|r| r.registered || r.created_at.saturating_add(UNREGISTERED_TTL_SECS) >= now)
            .ok_or_else(|| ServiceError::InvalidProof("unknown handle".into()))?;
        if record.submitter != *submitter || record.scope != *scope {
            return Err(ServiceError::InvalidProof(
                "handle was encrypted for a different submitter or scope".into(),
            ));
        }

        if !record.registered {
            self.vault.mark_registered(handle).await?;
            info!(%handle, %submitter, %scope, "input admitted");
        }
        Ok(*handle)
    }

    async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse> {
        let now = self.clock.now();
        let records = self.admit(request, now).await?;

        let auth = &request.authorization;
        let digest = auth.digest(&self.domain())?;
        if !self
            .vault
            .consume_authorization(&digest, auth.message.expires_at(), now)
            .await?
        {
            return Err(self.denied(&request.requester, DenialReason::Replayed));
        }

        let mut values = DecryptedValues::new();
        for record in &records {
            values.insert(record.handle, self.open_value(record)?);
        }

        let envelope = SealedEnvelope::seal(
            &encode_values(&values)?,
            &X25519PublicKey::from_bytes(*auth.public_key()),
            digest.as_bytes(),
        )?;

        info!(requester = %request.requester, handles = values.len(), "decryption granted");
        Ok(DecryptResponse { envelope })
    }
}
