//! In-memory implementation of the Ledger and CiphertextVault traits.
//!
//! Primarily for testing. Same semantics as SQLite, nothing persisted.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use oblivion_acl::AclRegistry;
use oblivion_core::{Blake3Hash, CiphertextHandle, Principal};

use crate::error::{Result, StoreError};
use crate::traits::{
    CiphertextRecord, CiphertextVault, CreateResult, InsertResult, Ledger, RenameResult,
    StoreRecord, UpsertResult,
};

/// In-memory ledger and vault.
///
/// All data is lost when dropped. Thread-safe via RwLock; each mutation holds
/// the write lock for its whole duration, which makes it atomic.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

#[derive(Default)]
struct MemoryLedgerInner {
    /// Stores keyed by owner.
    stores: HashMap<Principal, StoreRecord>,

    /// Grant state.
    acl: AclRegistry,

    /// Ciphertext material keyed by handle.
    ciphertexts: HashMap<CiphertextHandle, CiphertextRecord>,

    /// Consumed authorization digests with their expiry.
    consumed: HashMap<Blake3Hash, u64>,
}

impl MemoryLedger {
    /// Create a new empty in-memory ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLedgerInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLedgerInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create_store(&self, owner: &Principal, name: &str) -> Result<CreateResult> {
        let mut inner = self.write()?;
        if inner.stores.contains_key(owner) {
            return Ok(CreateResult::AlreadyExists);
        }
        inner.stores.insert(*owner, StoreRecord::new(*owner, name));
        Ok(CreateResult::Created)
    }

    async fn rename_store(&self, owner: &Principal, name: &str) -> Result<RenameResult> {
        let mut inner = self.write()?;
        Ok(match inner.stores.get_mut(owner) {
            Some(store) => RenameResult::Renamed {
                previous: std::mem::replace(&mut store.name, name.to_string()),
            },
            None => RenameResult::StoreMissing,
        })
    }

    async fn upsert_item(
        &self,
        owner: &Principal,
        item_name: &str,
        handle: &CiphertextHandle,
    ) -> Result<UpsertResult> {
        let mut guard = self.write()?;
        let inner = &mut *guard;

        let Some(store) = inner.stores.get_mut(owner) else {
            return Ok(UpsertResult::StoreMissing);
        };

        let previous = store.upsert(item_name, *handle);
        inner.acl.grant(*handle, *owner);

        Ok(match previous {
            Some(previous) => UpsertResult::Replaced { previous },
            None => UpsertResult::Inserted,
        })
    }

    async fn get_store(&self, owner: &Principal) -> Result<Option<StoreRecord>> {
        Ok(self.read()?.stores.get(owner).cloned())
    }

    async fn get_item(
        &self,
        owner: &Principal,
        item_name: &str,
    ) -> Result<Option<CiphertextHandle>> {
        Ok(self
            .read()?
            .stores
            .get(owner)
            .and_then(|s| s.item(item_name))
            .map(|i| i.handle))
    }

    async fn has_store(&self, owner: &Principal) -> Result<bool> {
        Ok(self.read()?.stores.contains_key(owner))
    }

    async fn is_authorized(
        &self,
        handle: &CiphertextHandle,
        principal: &Principal,
    ) -> Result<bool> {
        Ok(self.read()?.acl.is_authorized(handle, principal))
    }

    async fn grantees(&self, handle: &CiphertextHandle) -> Result<Vec<Principal>> {
        Ok(self.read()?.acl.grantees(handle).to_vec())
    }
}

#[async_trait]
impl CiphertextVault for MemoryLedger {
    async fn put_ciphertext(&self, record: &CiphertextRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.ciphertexts.contains_key(&record.handle) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.ciphertexts.insert(record.handle, record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_ciphertext(&self, handle: &CiphertextHandle) -> Result<Option<CiphertextRecord>> {
        Ok(self.read()?.ciphertexts.get(handle).cloned())
    }

    async fn mark_registered(&self, handle: &CiphertextHandle) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(match inner.ciphertexts.get_mut(handle) {
            Some(record) => {
                record.registered = true;
                true
            }
            None => false,
        })
    }

    async fn prune_unregistered(&self, created_before: u64) -> Result<usize> {
        let mut inner = self.write()?;
        let before = inner.ciphertexts.len();
        inner
            .ciphertexts
            .retain(|_, record| record.registered || record.created_at >= created_before);
        Ok(before - inner.ciphertexts.len())
    }

    async fn consume_authorization(
        &self,
        digest: &Blake3Hash,
        expires_at: u64,
        now: u64,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        inner.consumed.retain(|_, exp| *exp >= now);
        if inner.consumed.contains_key(digest) {
            return Ok(false);
        }
        inner.consumed.insert(*digest, expires_at);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oblivion_core::ContractId;

    fn owner(b: u8) -> Principal {
        Principal::from_bytes([b; 20])
    }

    fn handle(b: u8) -> CiphertextHandle {
        CiphertextHandle::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_create_store_once() {
        let ledger = MemoryLedger::new();

        assert_eq!(
            ledger.create_store(&owner(1), "Alice Shop").await.unwrap(),
            CreateResult::Created
        );
        assert_eq!(
            ledger.create_store(&owner(1), "Other").await.unwrap(),
            CreateResult::AlreadyExists
        );

        let store = ledger.get_store(&owner(1)).await.unwrap().unwrap();
        assert_eq!(store.name, "Alice Shop");
        assert!(store.items.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_grants_owner() {
        let ledger = MemoryLedger::new();
        ledger.create_store(&owner(1), "s").await.unwrap();

        assert_eq!(
            ledger.upsert_item(&owner(1), "apple", &handle(1)).await.unwrap(),
            UpsertResult::Inserted
        );
        assert!(ledger.is_authorized(&handle(1), &owner(1)).await.unwrap());
        assert!(!ledger.is_authorized(&handle(1), &owner(2)).await.unwrap());

        assert_eq!(
            ledger.upsert_item(&owner(1), "apple", &handle(2)).await.unwrap(),
            UpsertResult::Replaced {
                previous: handle(1)
            }
        );
        // Old grant persists.
        assert!(ledger.is_authorized(&handle(1), &owner(1)).await.unwrap());
        assert_eq!(
            ledger.get_item(&owner(1), "apple").await.unwrap(),
            Some(handle(2))
        );
    }

    #[tokio::test]
    async fn test_upsert_without_store_leaves_no_grant() {
        let ledger = MemoryLedger::new();

        assert_eq!(
            ledger.upsert_item(&owner(1), "apple", &handle(1)).await.unwrap(),
            UpsertResult::StoreMissing
        );
        assert!(!ledger.is_authorized(&handle(1), &owner(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_authorization_once() {
        let ledger = MemoryLedger::new();
        let digest = Blake3Hash::hash(b"auth");

        assert!(ledger.consume_authorization(&digest, 100, 10).await.unwrap());
        assert!(!ledger.consume_authorization(&digest, 100, 20).await.unwrap());
    }

    #[tokio::test]
    async fn test_ciphertext_registration() {
        let ledger = MemoryLedger::new();
        let record = CiphertextRecord {
            handle: handle(7),
            submitter: owner(1),
            scope: ContractId::from_bytes([9; 20]),
            payload: vec![1, 2, 3],
            registered: false,
            created_at: 0,
        };

        assert_eq!(
            ledger.put_ciphertext(&record).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            ledger.put_ciphertext(&record).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert!(ledger.mark_registered(&handle(7)).await.unwrap());
        assert!(!ledger.mark_registered(&handle(8)).await.unwrap());
        assert!(
            ledger
                .get_ciphertext(&handle(7))
                .await
                .unwrap()
                .unwrap()
                .registered
        );
    }

    #[tokio::test]
    async fn test_prune_keeps_admitted_and_recent() {
        let ledger = MemoryLedger::new();
        let record = |b: u8, created_at: u64| CiphertextRecord {
            handle: handle(b),
            submitter: owner(1),
            scope: ContractId::from_bytes([9; 20]),
            payload: vec![b],
            registered: false,
            created_at,
        };
        ledger.put_ciphertext(&record(1, 10)).await.unwrap();
        ledger.put_ciphertext(&record(2, 10)).await.unwrap();
        ledger.put_ciphertext(&record(3, 50)).await.unwrap();
        ledger.mark_registered(&handle(2)).await.unwrap();

        assert_eq!(ledger.prune_unregistered(50).await.unwrap(), 1);
        assert!(ledger.get_ciphertext(&handle(1)).await.unwrap().is_none());
        assert!(ledger.get_ciphertext(&handle(2)).await.unwrap().is_some());
        assert!(ledger.get_ciphertext(&handle(3)).await.unwrap().is_some());
        assert_eq!(ledger.prune_unregistered(50).await.unwrap(), 0);
    }
}
