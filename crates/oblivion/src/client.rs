//! The inventory client: encrypts quantities and decrypts inventories on
//! behalf of one identity.

use oblivion_core::validation::MAX_HANDLES_PER_REQUEST;
use oblivion_core::{CiphertextHandle, Clock, EncryptedInput, Keypair, Principal, SystemClock};
use oblivion_service::{DecryptedValues, EncryptionService, ServiceError, UserDecryptSession};
use oblivion_store::Ledger;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{OblivionError, Result};
use crate::registry::StoreRegistry;

/// One decrypted line of an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLine {
    /// Item name.
    pub name: String,
    /// Handle the quantity was read from.
    pub handle: CiphertextHandle,
    /// Cleartext quantity.
    pub quantity: u32,
}

/// A decrypted store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Store owner.
    pub owner: Principal,
    /// Store display name. Empty if the store has none or does not exist.
    pub name: String,
    /// Lines in insertion order.
    pub items: Vec<InventoryLine>,
}

/// Client for one identity.
pub struct InventoryClient<E, C = SystemClock> {
    /// Long-term identity that signs authorizations.
    identity: Keypair,
    /// The encryption service.
    service: E,
    /// Time source for authorization issuance.
    clock: C,
    /// Scope, validity window and retry policy.
    config: RegistryConfig,
}

impl<E: EncryptionService, C: Clock> InventoryClient<E, C> {
    /// Create a client.
    pub fn new(identity: Keypair, service: E, clock: C, config: RegistryConfig) -> Self {
        Self {
            identity,
            service,
            clock,
            config,
        }
    }

    /// The principal this client acts as.
    pub fn principal(&self) -> Principal {
        self.identity.principal()
    }

    /// Encrypt a quantity for submission to the registry.
    pub async fn encrypt_quantity(&self, quantity: u32) -> Result<EncryptedInput> {
        let service = &self.service;
        let principal = self.principal();
        let scope = self.config.scope;

        self.config
            .retry
            .run(move || async move {
                Ok(service.encrypt_input(quantity, &principal, &scope).await?)
            })
            .await
    }

    /// Decrypt handles this identity holds grants on.
    ///
    /// An empty handle set returns an empty result without contacting the
    /// service. Large sets are split into several authorizations.
    pub async fn user_decrypt(&self, handles: &[CiphertextHandle]) -> Result<DecryptedValues> {
        let mut values = DecryptedValues::new();
        for batch in handles.chunks(MAX_HANDLES_PER_REQUEST) {
            values.extend(self.decrypt_batch(batch).await?);
        }
        Ok(values)
    }

    async fn decrypt_batch(&self, handles: &[CiphertextHandle]) -> Result<DecryptedValues> {
        self.config
            .retry
            .run(|| self.decrypt_once(handles))
            .await
    }

    /// One attempt under a freshly signed authorization and ephemeral key.
    ///
    /// A failed attempt may already have consumed its authorization at the
    /// service, so nothing from it is reused.
    async fn decrypt_once(&self, handles: &[CiphertextHandle]) -> Result<DecryptedValues> {
        let mut session = UserDecryptSession::new(self.service.domain());
        session.generate_keypair()?;
        session.compose(
            handles.iter().copied(),
            [self.config.scope],
            self.clock.now(),
            self.config.validity_secs,
        )?;
        session.sign(&self.identity)?;

        Ok(session.submit(&self.service).await?)
    }

    /// Decrypt every item of `owner`'s store.
    ///
    /// Only succeeds for stores whose handles this identity holds grants on,
    /// which in practice means its own.
    pub async fn decrypt_inventory<L, S>(
        &self,
        registry: &StoreRegistry<L, S>,
        owner: &Principal,
    ) -> Result<Inventory>
    where
        L: Ledger,
        S: EncryptionService,
    {
        let view = registry.get_store(owner).await?;
        let values = self.user_decrypt(&view.handles).await?;

        let items = view
            .items()
            .map(|(name, handle)| -> Result<InventoryLine> {
                let quantity = values.get(handle).copied().ok_or_else(|| {
                    OblivionError::Service(ServiceError::Encoding(format!(
                        "response omitted {}",
                        handle
                    )))
                })?;
                Ok(InventoryLine {
                    name: name.to_string(),
                    handle: *handle,
                    quantity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(%owner, items = items.len(), "inventory decrypted");
        Ok(Inventory {
            owner: *owner,
            name: view.name,
            items,
        })
    }
}
