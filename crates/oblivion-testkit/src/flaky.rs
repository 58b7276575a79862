//! An encryption service that fails on demand.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use oblivion_core::{
    CiphertextHandle, ContractId, EncryptedInput, InputProof, Principal, TypedDataDomain,
};
use oblivion_service::{DecryptRequest, DecryptResponse, EncryptionService, Result, ServiceError};

/// Wraps a service and answers the next `failures` calls with
/// `ServiceError::Unavailable` before forwarding anything.
///
/// Failed calls never reach the inner service. [`lose_next_replies`] arms
/// the other failure mode: the decryption reaches the inner service and is
/// carried out, then its reply is dropped.
///
/// [`lose_next_replies`]: FlakyService::lose_next_replies
pub struct FlakyService<S> {
    inner: S,
    failures_left: AtomicU32,
    replies_lost: AtomicU32,
    calls: AtomicU32,
    decrypt_calls: AtomicU32,
}

impl<S: EncryptionService> FlakyService<S> {
    /// Wrap `inner`, failing the next `failures` calls.
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            failures_left: AtomicU32::new(failures),
            replies_lost: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            decrypt_calls: AtomicU32::new(0),
        }
    }

    /// Fail the next `failures` calls.
    pub fn fail_next(&self, failures: u32) {
        self.failures_left.store(failures, Ordering::SeqCst);
    }

    /// Forward the next `replies` decryptions, then answer each with
    /// `ServiceError::Unavailable` whatever the inner service returned.
    pub fn lose_next_replies(&self, replies: u32) {
        self.replies_lost.store(replies, Ordering::SeqCst);
    }

    /// Calls made so far, failed or not. `domain` is not counted.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Decryption calls made so far, failed or not.
    pub fn decrypt_calls(&self) -> u32 {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    /// The wrapped service.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn enter(&self) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let tripped = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if tripped {
            return Err(ServiceError::Unavailable(format!("injected failure on call {}", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: EncryptionService> EncryptionService for FlakyService<S> {
    fn domain(&self) -> TypedDataDomain {
        self.inner.domain()
    }

    async fn encrypt_input(
        &self,
        value: u32,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<EncryptedInput> {
        self.enter()?;
        self.inner.encrypt_input(value, submitter, scope).await
    }

    async fn validate_and_register(
        &self,
        handle: &CiphertextHandle,
        proof: &InputProof,
        submitter: &Principal,
        scope: &ContractId,
    ) -> Result<CiphertextHandle> {
        self.enter()?;
        self.inner
            .validate_and_register(handle, proof, submitter, scope)
            .await
    }

    async fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptResponse> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.enter()?;
        let reply = self.inner.decrypt(request).await;

        let lost = self
            .replies_lost
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(ServiceError::Unavailable("decryption reply lost".into()));
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use oblivion_core::{AuthorizationMessage, Keypair, ManualClock, DEFAULT_VALIDITY_SECS};
    use oblivion_service::{DenialReason, LocalEncryptionService};
    use oblivion_store::{Ledger, MemoryLedger};

    use crate::fixtures::{FIXTURE_NOW, SERVICE_SEED};

    type Local = LocalEncryptionService<Arc<MemoryLedger>, Arc<MemoryLedger>, ManualClock>;

    fn flaky(failures: u32) -> FlakyService<Local> {
        let ledger = Arc::new(MemoryLedger::new());
        let service = LocalEncryptionService::new(
            &SERVICE_SEED,
            ledger.clone(),
            ledger,
            ManualClock::new(FIXTURE_NOW),
        );
        FlakyService::new(service, failures)
    }

    #[tokio::test]
    async fn test_fails_then_recovers() {
        let service = flaky(2);
        let who = Principal::from_bytes([1; 20]);
        let scope = ContractId::derive("flaky");

        for _ in 0..2 {
            let err = service.encrypt_input(5, &who, &scope).await.unwrap_err();
            assert!(err.is_retryable());
        }
        assert!(service.encrypt_input(5, &who, &scope).await.is_ok());
        assert_eq!(service.calls(), 3);
        assert_eq!(service.decrypt_calls(), 0);
    }

    #[tokio::test]
    async fn test_fail_next_rearms() {
        let service = flaky(0);
        let who = Principal::from_bytes([1; 20]);
        let scope = ContractId::derive("flaky");

        assert!(service.encrypt_input(1, &who, &scope).await.is_ok());
        service.fail_next(1);
        assert!(service.encrypt_input(1, &who, &scope).await.is_err());
        assert!(service.encrypt_input(1, &who, &scope).await.is_ok());
    }

    #[tokio::test]
    async fn test_lost_reply_still_reaches_service() {
        let ledger = Arc::new(MemoryLedger::new());
        let service = FlakyService::new(
            LocalEncryptionService::new(
                &SERVICE_SEED,
                ledger.clone(),
                ledger.clone(),
                ManualClock::new(FIXTURE_NOW),
            ),
            0,
        );
        let owner = Keypair::from_seed(&[3; 32]);
        let who = owner.principal();
        let scope = ContractId::derive("flaky");

        let input = service.encrypt_input(9, &who, &scope).await.unwrap();
        let handle = service
            .validate_and_register(&input.handle, &input.proof, &who, &scope)
            .await
            .unwrap();
        ledger.create_store(&who, "shop").await.unwrap();
        ledger.upsert_item(&who, "nails", &handle).await.unwrap();

        let auth = AuthorizationMessage::new(
            [5u8; 32],
            [handle],
            [scope],
            FIXTURE_NOW,
            DEFAULT_VALIDITY_SECS,
        )
        .sign(&owner, &service.domain())
        .unwrap();
        let request = DecryptRequest::for_authorization(auth);

        service.lose_next_replies(1);
        let err = service.decrypt(&request).await.unwrap_err();
        assert!(err.is_retryable());

        // The inner service already consumed the authorization.
        assert!(matches!(
            service.decrypt(&request).await,
            Err(ServiceError::Denied(DenialReason::Replayed))
        ));
        assert_eq!(service.decrypt_calls(), 2);
    }
}
