//! # Oblivion Testkit
//!
//! Testing utilities for Oblivion.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory ledger, a local encryption service on a
//!   manual clock, a registry, and seeded clients wired together
//! - **Generators**: Proptest strategies for names, quantities and item writes
//! - **Fault injection**: an encryption service wrapper that fails on demand
//!
//! ## Test Fixtures
//!
//! ```rust
//! use oblivion_testkit::fixtures::TestFixture;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fixture = TestFixture::new();
//! let alice = fixture.party(0);
//!
//! fixture.registry.create_store(&alice.principal(), "Alice Shop").await.unwrap();
//! fixture.stock(&alice, "apple", 7).await.unwrap();
//!
//! let inventory = alice
//!     .decrypt_inventory(&fixture.registry, &alice.principal())
//!     .await
//!     .unwrap();
//! assert_eq!(inventory.items[0].quantity, 7);
//! # });
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use oblivion_testkit::generators::{expected_inventory, item_writes};
//!
//! proptest! {
//!     #[test]
//!     fn last_write_wins(writes in item_writes(16)) {
//!         let expected = expected_inventory(&writes);
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod flaky;
pub mod generators;

pub use fixtures::{multi_party_clients, TestClient, TestFixture, TestRegistry, TestService};
pub use flaky::FlakyService;
pub use generators::{expected_inventory, item_writes, ItemWrite};
