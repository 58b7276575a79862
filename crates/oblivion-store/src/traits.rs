//! Ledger and vault traits: the abstract interface for persistence.
//!
//! These traits keep the registry and the encryption service storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use oblivion_core::{Blake3Hash, CiphertextHandle, ContractId, Principal};

use crate::error::Result;

/// One named entry in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
    /// Item name, unique within its store.
    pub name: String,
    /// Handle of the item's encrypted quantity.
    pub handle: CiphertextHandle,
}

/// A confidential store: an owner, a display name, and ordered items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// The owning principal.
    pub owner: Principal,
    /// Display name. May be empty.
    pub name: String,
    /// Items in insertion order.
    pub items: Vec<StoreItem>,
}

impl StoreRecord {
    /// A freshly created store with no items.
    pub fn new(owner: Principal, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Look up an item by name.
    pub fn item(&self, name: &str) -> Option<&StoreItem> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Item names in insertion order.
    pub fn item_names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }

    /// Handles in insertion order.
    pub fn handles(&self) -> Vec<CiphertextHandle> {
        self.items.iter().map(|i| i.handle).collect()
    }

    /// Insert or replace an item, keeping the original position on replace.
    ///
    /// Returns the previous handle if the item existed.
    pub fn upsert(&mut self, name: &str, handle: CiphertextHandle) -> Option<CiphertextHandle> {
        match self.items.iter_mut().find(|i| i.name == name) {
            Some(item) => Some(std::mem::replace(&mut item.handle, handle)),
            None => {
                self.items.push(StoreItem {
                    name: name.to_string(),
                    handle,
                });
                None
            }
        }
    }
}

/// Result of creating a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResult {
    /// Store was created.
    Created,
    /// The owner already has a store; nothing changed.
    AlreadyExists,
}

/// Result of renaming a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameResult {
    /// Name was overwritten.
    Renamed {
        /// The name before the rename.
        previous: String,
    },
    /// The owner has no store; nothing changed.
    StoreMissing,
}

/// Result of writing an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertResult {
    /// A new item was appended.
    Inserted,
    /// An existing item's handle was replaced. The previous handle is orphaned.
    Replaced {
        /// The handle that was replaced.
        previous: CiphertextHandle,
    },
    /// The owner has no store; nothing changed.
    StoreMissing,
}

/// Result of inserting into the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with the same handle already exists (idempotent, not an error).
    AlreadyExists,
}

/// Ciphertext material held by the encryption service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextRecord {
    /// The handle this record backs.
    pub handle: CiphertextHandle,
    /// Principal the input was encrypted for.
    pub submitter: Principal,
    /// Contract scope the input was encrypted for.
    pub scope: ContractId,
    /// Sealed value, opaque to storage.
    pub payload: Vec<u8>,
    /// Whether the handle has been admitted by `validate_and_register`.
    pub registered: bool,
    /// When the record was created (Unix seconds).
    pub created_at: u64,
}

/// The Ledger trait: owner-keyed store records plus their ACL grants.
///
/// Every mutating method is atomic: it either fully applies or leaves no
/// trace, and readers only ever observe committed state.
///
/// # Design Notes
///
/// - **Single writer for grants**: the only way to create a grant is
///   [`Ledger::upsert_item`], which records `(handle, owner)` in the same
///   commit as the item write.
/// - **No deletes**: stores, items and grants are never removed.
#[async_trait]
pub trait Ledger: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Store Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty store for `owner`.
    async fn create_store(&self, owner: &Principal, name: &str) -> Result<CreateResult>;

    /// Overwrite the display name of `owner`'s store.
    async fn rename_store(&self, owner: &Principal, name: &str) -> Result<RenameResult>;

    /// Insert or replace an item and grant its handle to the owner.
    async fn upsert_item(
        &self,
        owner: &Principal,
        item_name: &str,
        handle: &CiphertextHandle,
    ) -> Result<UpsertResult>;

    /// Get `owner`'s store.
    async fn get_store(&self, owner: &Principal) -> Result<Option<StoreRecord>>;

    /// Get the handle of one item.
    async fn get_item(
        &self,
        owner: &Principal,
        item_name: &str,
    ) -> Result<Option<CiphertextHandle>>;

    /// Check whether `owner` has a store.
    async fn has_store(&self, owner: &Principal) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // ACL Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether `principal` may request decryption of `handle`.
    async fn is_authorized(&self, handle: &CiphertextHandle, principal: &Principal)
        -> Result<bool>;

    /// Principals granted on a handle, oldest first.
    async fn grantees(&self, handle: &CiphertextHandle) -> Result<Vec<Principal>>;
}

/// The CiphertextVault trait: storage behind the encryption service.
#[async_trait]
pub trait CiphertextVault: Send + Sync {
    /// Store a freshly encrypted input.
    async fn put_ciphertext(&self, record: &CiphertextRecord) -> Result<InsertResult>;

    /// Fetch a ciphertext by handle.
    async fn get_ciphertext(&self, handle: &CiphertextHandle) -> Result<Option<CiphertextRecord>>;

    /// Mark a ciphertext as admitted. Returns `false` if the handle is unknown.
    async fn mark_registered(&self, handle: &CiphertextHandle) -> Result<bool>;

    /// Drop never-admitted ciphertexts created before `created_before`.
    ///
    /// Admitted ciphertexts are kept. Returns how many records were removed.
    async fn prune_unregistered(&self, created_before: u64) -> Result<usize>;

    /// Record an authorization digest as consumed.
    ///
    /// Returns `false` if the digest was consumed before. Entries whose
    /// `expires_at` is before `now` may be pruned, since an expired
    /// authorization is rejected regardless.
    async fn consume_authorization(
        &self,
        digest: &Blake3Hash,
        expires_at: u64,
        now: u64,
    ) -> Result<bool>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn create_store(&self, owner: &Principal, name: &str) -> Result<CreateResult> {
        (**self).create_store(owner, name).await
    }

    async fn rename_store(&self, owner: &Principal, name: &str) -> Result<RenameResult> {
        (**self).rename_store(owner, name).await
    }

    async fn upsert_item(
        &self,
        owner: &Principal,
        item_name: &str,
        handle: &CiphertextHandle,
    ) -> Result<UpsertResult> {
        (**self).upsert_item(owner, item_name, handle).await
    }

    async fn get_store(&self, owner: &Principal) -> Result<Option<StoreRecord>> {
        (**self).get_store(owner).await
    }

    async fn get_item(
        &self,
        owner: &Principal,
        item_name: &str,
    ) -> Result<Option<CiphertextHandle>> {
        (**self).get_item(owner, item_name).await
    }

    async fn has_store(&self, owner: &Principal) -> Result<bool> {
        (**self).has_store(owner).await
    }

    async fn is_authorized(
        &self,
        handle: &CiphertextHandle,
        principal: &Principal,
    ) -> Result<bool> {
        (**self).is_authorized(handle, principal).await
    }

    async fn grantees(&self, handle: &CiphertextHandle) -> Result<Vec<Principal>> {
        (**self).grantees(handle).await
    }
}

#[async_trait]
impl<V: CiphertextVault + ?Sized> CiphertextVault for Arc<V> {
    async fn put_ciphertext(&self, record: &CiphertextRecord) -> Result<InsertResult> {
        (**self).put_ciphertext(record).await
    }

    async fn get_ciphertext(&self, handle: &CiphertextHandle) -> Result<Option<CiphertextRecord>> {
        (**self).get_ciphertext(handle).await
    }

    async fn mark_registered(&self, handle: &CiphertextHandle) -> Result<bool> {
        (**self).mark_registered(handle).await
    }

    async fn prune_unregistered(&self, created_before: u64) -> Result<usize> {
        (**self).prune_unregistered(created_before).await
    }

    async fn consume_authorization(
        &self,
        digest: &Blake3Hash,
        expires_at: u64,
        now: u64,
    ) -> Result<bool> {
        (**self).consume_authorization(digest, expires_at, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_upsert_keeps_position() {
        let mut record = StoreRecord::new(Principal::from_bytes([1; 20]), "shop");
        let h = |b| CiphertextHandle::from_bytes([b; 32]);

        assert_eq!(record.upsert("apple", h(1)), None);
        assert_eq!(record.upsert("pear", h(2)), None);
        assert_eq!(record.upsert("apple", h(3)), Some(h(1)));

        assert_eq!(record.item_names(), vec!["apple", "pear"]);
        assert_eq!(record.handles(), vec![h(3), h(2)]);
        assert_eq!(record.item("pear").map(|i| i.handle), Some(h(2)));
    }

    proptest! {
        #[test]
        fn prop_item_names_unique_and_first_seen(
            writes in prop::collection::vec((0u8..6, any::<u8>()), 0..40)
        ) {
            let mut record = StoreRecord::new(Principal::from_bytes([1; 20]), "");
            let mut first_seen: Vec<String> = Vec::new();

            for (name, h) in writes {
                let name = format!("item-{}", name);
                record.upsert(&name, CiphertextHandle::from_bytes([h; 32]));
                if !first_seen.contains(&name) {
                    first_seen.push(name.clone());
                }
                prop_assert_eq!(
                    record.item(&name).map(|i| i.handle),
                    Some(CiphertextHandle::from_bytes([h; 32]))
                );
            }

            prop_assert_eq!(record.item_names(), first_seen);
        }
    }
}
