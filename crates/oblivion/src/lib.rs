//! # Oblivion
//!
//! Confidential inventory stores: per-owner inventories whose quantities are
//! held as encrypted handles, with access-control grants attached to every
//! stored handle and a signed, time-limited protocol for decrypting them.
//!
//! ## Overview
//!
//! - **Stores**: one per principal, a display name plus ordered, name-keyed
//!   items, each pointing at a ciphertext handle
//! - **Grants**: written alongside every item write, never revoked
//! - **Decryption**: the owner signs an authorization for an ephemeral key and
//!   the encryption service answers with plaintexts sealed to that key
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use oblivion::{InventoryClient, RegistryConfig, StoreRegistry};
//! use oblivion::core::{Keypair, SystemClock};
//! use oblivion::service::LocalEncryptionService;
//! use oblivion::store::SqliteLedger;
//!
//! async fn example() -> oblivion::Result<()> {
//!     let ledger = Arc::new(SqliteLedger::open("oblivion.db")?);
//!     let service = Arc::new(LocalEncryptionService::new(
//!         &[0; 32],
//!         ledger.clone(),
//!         ledger.clone(),
//!         SystemClock,
//!     ));
//!     let config = RegistryConfig::default();
//!     let registry = StoreRegistry::new(ledger, service.clone(), config.clone());
//!
//!     let alice = InventoryClient::new(Keypair::generate(), service, SystemClock, config);
//!     let me = alice.principal();
//!
//!     registry.create_store(&me, "Alice Shop").await?;
//!     let input = alice.encrypt_quantity(7).await?;
//!     registry
//!         .add_or_update_item(&me, "apple", &input.handle, &input.proof)
//!         .await?;
//!
//!     let inventory = alice.decrypt_inventory(&registry, &me).await?;
//!     assert_eq!(inventory.items[0].quantity, 7);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! The component crates are re-exported for convenience:
//!
//! - `oblivion::core` - Principals, handles, identity keys, authorizations
//! - `oblivion::acl` - Grants and sealed envelopes
//! - `oblivion::store` - Ledger abstraction and SQLite
//! - `oblivion::service` - Encryption service and decryption protocol

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod retry;

pub use client::{Inventory, InventoryClient, InventoryLine};
pub use config::RegistryConfig;
pub use error::{OblivionError, Result};
pub use registry::{StoreRegistry, StoreView};
pub use retry::RetryPolicy;

pub use oblivion_acl as acl;
pub use oblivion_core as core;
pub use oblivion_service as service;
pub use oblivion_store as store;
