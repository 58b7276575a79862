//! # Oblivion Store
//!
//! Persistence for confidential stores, their ACL grants, and the material
//! behind the encryption service.
//!
//! ## Overview
//!
//! The [`Ledger`] trait holds owner-keyed store records and the append-only
//! grant table. The [`CiphertextVault`] trait holds sealed input values and
//! spent authorization digests. Both are implemented by [`SqliteLedger`]
//! (persistent) and [`MemoryLedger`] (tests), so a single database file can
//! back an entire deployment.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oblivion_store::{Ledger, SqliteLedger};
//! use oblivion_core::Principal;
//!
//! async fn example() -> oblivion_store::Result<()> {
//!     let ledger = SqliteLedger::open("oblivion.db")?;
//!     let owner = Principal::from_bytes([1; 20]);
//!     ledger.create_store(&owner, "Alice Shop").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic item writes**: an item write and the owner's grant on the new
//!   handle commit together
//! - **Stable ordering**: items keep their first insertion position when
//!   their handle is replaced

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{
    CiphertextRecord, CiphertextVault, CreateResult, InsertResult, Ledger, RenameResult,
    StoreItem, StoreRecord, UpsertResult,
};
