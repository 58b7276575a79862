//! The store registry: owner-scoped confidential inventories.
//!
//! The registry brings together the ledger and the encryption service. It is
//! the only writer of store records, and through them of ACL grants.

use oblivion_core::{
    validate_item_name, validate_store_name, CiphertextHandle, ContractId, InputProof, Principal,
};
use oblivion_service::EncryptionService;
use oblivion_store::{CreateResult, Ledger, RenameResult, StoreRecord, UpsertResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::error::{OblivionError, Result};

/// What a principal's store looks like from the query surface.
///
/// A principal with no store sees the empty view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreView {
    /// Display name.
    pub name: String,
    /// Item names in insertion order.
    pub item_names: Vec<String>,
    /// Handles, aligned with `item_names`.
    pub handles: Vec<CiphertextHandle>,
}

impl StoreView {
    /// Whether the view lists no items.
    pub fn is_empty(&self) -> bool {
        self.item_names.is_empty()
    }

    /// `(name, handle)` pairs in order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &CiphertextHandle)> {
        self.item_names
            .iter()
            .map(String::as_str)
            .zip(self.handles.iter())
    }
}

impl From<StoreRecord> for StoreView {
    fn from(record: StoreRecord) -> Self {
        let (item_names, handles) = record
            .items
            .into_iter()
            .map(|item| (item.name, item.handle))
            .unzip();
        Self {
            name: record.name,
            item_names,
            handles,
        }
    }
}

/// The store registry.
///
/// Every mutation is keyed by the caller's principal; there is no way to
/// write another principal's store.
pub struct StoreRegistry<L: Ledger, E: EncryptionService> {
    /// The ledger backend.
    ledger: L,
    /// The encryption service that admits inputs.
    service: E,
    /// Configuration.
    config: RegistryConfig,
}

impl<L: Ledger, E: EncryptionService> StoreRegistry<L, E> {
    /// Create a registry over a ledger and an encryption service.
    pub fn new(ledger: L, service: E, config: RegistryConfig) -> Self {
        Self {
            ledger,
            service,
            config,
        }
    }

    /// The contract scope handles are registered under.
    pub fn scope(&self) -> ContractId {
        self.config.scope
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty store for `caller`.
    ///
    /// Fails with `AlreadyExists` if the caller owns one, whatever its name.
    pub async fn create_store(&self, caller: &Principal, name: &str) -> Result<StoreRecord> {
        validate_store_name(name)?;

        match self.ledger.create_store(caller, name).await? {
            CreateResult::Created => {
                info!(owner = %caller, "store created");
                Ok(StoreRecord::new(*caller, name))
            }
            CreateResult::AlreadyExists => Err(OblivionError::AlreadyExists(*caller)),
        }
    }

    /// Overwrite the display name of `caller`'s store. Items are untouched.
    pub async fn rename_store(&self, caller: &Principal, name: &str) -> Result<()> {
        validate_store_name(name)?;

        match self.ledger.rename_store(caller, name).await? {
            RenameResult::Renamed { .. } => {
                info!(owner = %caller, "store renamed");
                Ok(())
            }
            RenameResult::StoreMissing => Err(store_missing(caller)),
        }
    }

    /// Insert or replace an item with a freshly encrypted quantity.
    ///
    /// The encryption service must accept `proof` for `(handle, caller,
    /// scope)`. On success the item points at the admitted handle and the
    /// caller holds a grant on it; a replaced handle keeps its old grant.
    pub async fn add_or_update_item(
        &self,
        caller: &Principal,
        item_name: &str,
        handle: &CiphertextHandle,
        proof: &InputProof,
    ) -> Result<CiphertextHandle> {
        validate_item_name(item_name)?;

        if !self.ledger.has_store(caller).await? {
            return Err(store_missing(caller));
        }

        let admitted = self
            .service
            .validate_and_register(handle, proof, caller, &self.config.scope)
            .await?;

        match self.ledger.upsert_item(caller, item_name, &admitted).await? {
            UpsertResult::Inserted => {
                info!(owner = %caller, handle = %admitted, "item added");
            }
            UpsertResult::Replaced { previous } => {
                info!(owner = %caller, handle = %admitted, "item updated");
                debug!(%previous, "previous handle orphaned");
            }
            UpsertResult::StoreMissing => return Err(store_missing(caller)),
        }

        Ok(admitted)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a principal's store. The empty view if it has none.
    pub async fn get_store(&self, principal: &Principal) -> Result<StoreView> {
        Ok(self
            .ledger
            .get_store(principal)
            .await?
            .map(StoreView::from)
            .unwrap_or_default())
    }

    /// Get a principal's store name. Empty if it has no store.
    pub async fn get_store_name(&self, principal: &Principal) -> Result<String> {
        Ok(self
            .ledger
            .get_store(principal)
            .await?
            .map(|s| s.name)
            .unwrap_or_default())
    }

    /// Get the handle of one item.
    pub async fn get_item(
        &self,
        principal: &Principal,
        item_name: &str,
    ) -> Result<CiphertextHandle> {
        if !self.ledger.has_store(principal).await? {
            return Err(store_missing(principal));
        }
        self.ledger
            .get_item(principal, item_name)
            .await?
            .ok_or_else(|| {
                OblivionError::NotFound(format!("item {:?} in store of {}", item_name, principal))
            })
    }

    /// Whether a principal has created a store.
    pub async fn has_store(&self, principal: &Principal) -> Result<bool> {
        Ok(self.ledger.has_store(principal).await?)
    }

    /// Principals granted on a handle, oldest first.
    pub async fn grantees(&self, handle: &CiphertextHandle) -> Result<Vec<Principal>> {
        Ok(self.ledger.grantees(handle).await?)
    }

    /// Whether a principal holds a grant on a handle.
    pub async fn is_authorized(
        &self,
        handle: &CiphertextHandle,
        principal: &Principal,
    ) -> Result<bool> {
        Ok(self.ledger.is_authorized(handle, principal).await?)
    }
}

fn store_missing(owner: &Principal) -> OblivionError {
    OblivionError::NotFound(format!("store of {}", owner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use oblivion_core::{Keypair, ManualClock, ValidationError};
    use oblivion_service::LocalEncryptionService;
    use oblivion_store::MemoryLedger;

    type TestRegistry = StoreRegistry<
        Arc<MemoryLedger>,
        Arc<LocalEncryptionService<Arc<MemoryLedger>, Arc<MemoryLedger>, ManualClock>>,
    >;

    fn registry() -> TestRegistry {
        let ledger = Arc::new(MemoryLedger::new());
        let service = Arc::new(LocalEncryptionService::new(
            &[5; 32],
            ledger.clone(),
            ledger.clone(),
            ManualClock::new(1_700_000_000),
        ));
        StoreRegistry::new(ledger, service, RegistryConfig::default())
    }

    async fn encrypted(
        registry: &TestRegistry,
        owner: &Principal,
        value: u32,
    ) -> oblivion_core::EncryptedInput {
        registry
            .service
            .encrypt_input(value, owner, &registry.scope())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_store_exactly_once() {
        let registry = registry();
        let alice = Keypair::from_seed(&[1; 32]).principal();

        assert!(!registry.has_store(&alice).await.unwrap());
        let store = registry.create_store(&alice, "Alice Shop").await.unwrap();
        assert_eq!(store.name, "Alice Shop");
        assert!(registry.has_store(&alice).await.unwrap());

        let err = registry.create_store(&alice, "Another").await.unwrap_err();
        assert!(matches!(err, OblivionError::AlreadyExists(p) if p == alice));
        assert_eq!(registry.get_store_name(&alice).await.unwrap(), "Alice Shop");
    }

    #[tokio::test]
    async fn test_empty_name_still_counts_as_store() {
        let registry = registry();
        let alice = Keypair::from_seed(&[1; 32]).principal();

        registry.create_store(&alice, "").await.unwrap();
        assert!(registry.has_store(&alice).await.unwrap());
        assert!(matches!(
            registry.create_store(&alice, "").await,
            Err(OblivionError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_store_queries() {
        let registry = registry();
        let nobody = Keypair::from_seed(&[2; 32]).principal();

        assert_eq!(registry.get_store(&nobody).await.unwrap(), StoreView::default());
        assert_eq!(registry.get_store_name(&nobody).await.unwrap(), "");
        assert!(matches!(
            registry.get_item(&nobody, "apple").await,
            Err(OblivionError::NotFound(_))
        ));
        assert!(matches!(
            registry.rename_store(&nobody, "x").await,
            Err(OblivionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_item_requires_store() {
        let registry = registry();
        let alice = Keypair::from_seed(&[1; 32]).principal();
        let input = encrypted(&registry, &alice, 7).await;

        let err = registry
            .add_or_update_item(&alice, "apple", &input.handle, &input.proof)
            .await
            .unwrap_err();
        assert!(matches!(err, OblivionError::NotFound(_)));
        assert!(!registry.is_authorized(&input.handle, &alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_proof_leaves_store_untouched() {
        let registry = registry();
        let alice = Keypair::from_seed(&[1; 32]).principal();
        let mallory = Keypair::from_seed(&[3; 32]).principal();
        registry.create_store(&alice, "Alice Shop").await.unwrap();
        registry.create_store(&mallory, "Mallory").await.unwrap();

        // Mallory replays Alice's input under her own identity.
        let input = encrypted(&registry, &alice, 7).await;
        let err = registry
            .add_or_update_item(&mallory, "apple", &input.handle, &input.proof)
            .await
            .unwrap_err();

        assert!(matches!(err, OblivionError::InvalidProof(_)));
        assert!(registry.get_store(&mallory).await.unwrap().is_empty());
        assert!(!registry.is_authorized(&input.handle, &mallory).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_entry_and_old_grant() {
        let registry = registry();
        let alice = Keypair::from_seed(&[1; 32]).principal();
        registry.create_store(&alice, "Alice Shop").await.unwrap();

        let first = encrypted(&registry, &alice, 7).await;
        registry
            .add_or_update_item(&alice, "apple", &first.handle, &first.proof)
            .await
            .unwrap();
        let second = encrypted(&registry, &alice, 5).await;
        registry
            .add_or_update_item(&alice, "apple", &second.handle, &second.proof)
            .await
            .unwrap();

        let view = registry.get_store(&alice).await.unwrap();
        assert_eq!(view.item_names, vec!["apple"]);
        assert_eq!(view.handles, vec![second.handle]);
        assert_ne!(first.handle, second.handle);
        assert!(registry.is_authorized(&first.handle, &alice).await.unwrap());
        assert_eq!(registry.grantees(&second.handle).await.unwrap(), vec![alice]);
    }

    #[tokio::test]
    async fn test_names_validated_before_state_changes() {
        let registry = registry();
        let alice = Keypair::from_seed(&[1; 32]).principal();

        let long = "x".repeat(257);
        assert!(matches!(
            registry.create_store(&alice, &long).await,
            Err(OblivionError::InvalidName(ValidationError::NameTooLong { .. }))
        ));
        assert!(!registry.has_store(&alice).await.unwrap());

        registry.create_store(&alice, "ok").await.unwrap();
        let input = encrypted(&registry, &alice, 1).await;
        assert!(matches!(
            registry
                .add_or_update_item(&alice, "", &input.handle, &input.proof)
                .await,
            Err(OblivionError::InvalidName(ValidationError::EmptyItemName))
        ));
    }
}
