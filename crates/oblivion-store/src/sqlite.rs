//! SQLite implementation of the Ledger and CiphertextVault traits.
//!
//! The primary storage backend. It uses rusqlite with bundled SQLite, wrapped
//! in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use oblivion_core::{Blake3Hash, CiphertextHandle, ContractId, Principal};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_secs};
use crate::traits::{
    CiphertextRecord, CiphertextVault, CreateResult, InsertResult, Ledger, RenameResult,
    StoreItem, StoreRecord, UpsertResult,
};

/// SQLite-based ledger and vault.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteLedger {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.display(), "opened ledger");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn blob_error(idx: usize, column: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(idx, column.into(), Type::Blob)
}

fn principal_from_blob(bytes: Vec<u8>, idx: usize, column: &str) -> rusqlite::Result<Principal> {
    bytes
        .try_into()
        .map(Principal::from_bytes)
        .map_err(|_| blob_error(idx, column))
}

fn handle_from_blob(
    bytes: Vec<u8>,
    idx: usize,
    column: &str,
) -> rusqlite::Result<CiphertextHandle> {
    bytes
        .try_into()
        .map(CiphertextHandle::from_bytes)
        .map_err(|_| blob_error(idx, column))
}

// Helper to convert a row to CiphertextRecord
fn row_to_ciphertext(row: &rusqlite::Row<'_>) -> rusqlite::Result<CiphertextRecord> {
    let scope: Vec<u8> = row.get(2)?;

    Ok(CiphertextRecord {
        handle: handle_from_blob(row.get(0)?, 0, "handle")?,
        submitter: principal_from_blob(row.get(1)?, 1, "submitter")?,
        scope: ContractId::from_bytes(scope.try_into().map_err(|_| blob_error(2, "scope"))?),
        payload: row.get(3)?,
        registered: row.get::<_, i64>(4)? != 0,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn create_store(&self, owner: &Principal, name: &str) -> Result<CreateResult> {
        let owner = *owner;
        let name = name.to_string();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO stores (owner, name, created_at) VALUES (?1, ?2, ?3)",
                params![owner.as_bytes().as_slice(), name, now_secs()],
            )?;

            Ok(if inserted == 0 {
                CreateResult::AlreadyExists
            } else {
                CreateResult::Created
            })
        })
        .await
    }

    async fn rename_store(&self, owner: &Principal, name: &str) -> Result<RenameResult> {
        let owner = *owner;
        let name = name.to_string();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let previous: Option<String> = tx
                .query_row(
                    "SELECT name FROM stores WHERE owner = ?1",
                    params![owner.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(previous) = previous else {
                return Ok(RenameResult::StoreMissing);
            };

            tx.execute(
                "UPDATE stores SET name = ?2 WHERE owner = ?1",
                params![owner.as_bytes().as_slice(), name],
            )?;
            tx.commit()?;

            Ok(RenameResult::Renamed { previous })
        })
        .await
    }

    async fn upsert_item(
        &self,
        owner: &Principal,
        item_name: &str,
        handle: &CiphertextHandle,
    ) -> Result<UpsertResult> {
        let owner = *owner;
        let item_name = item_name.to_string();
        let handle = *handle;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let owner_bytes = owner.as_bytes().as_slice();
            let handle_bytes = handle.as_bytes().as_slice();

            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM stores WHERE owner = ?1",
                    params![owner_bytes],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !exists {
                return Ok(UpsertResult::StoreMissing);
            }

            let previous: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT handle FROM store_items WHERE owner = ?1 AND name = ?2",
                    params![owner_bytes, item_name],
                    |row| row.get(0),
                )
                .optional()?;

            let result = match previous {
                Some(previous) => {
                    tx.execute(
                        "UPDATE store_items SET handle = ?3, updated_at = ?4
                         WHERE owner = ?1 AND name = ?2",
                        params![owner_bytes, item_name, handle_bytes, now_secs()],
                    )?;
                    let previous = handle_from_blob(previous, 0, "handle")?;
                    UpsertResult::Replaced { previous }
                }
                None => {
                    let position: i64 = tx.query_row(
                        "SELECT COALESCE(MAX(position) + 1, 0) FROM store_items WHERE owner = ?1",
                        params![owner_bytes],
                        |row| row.get(0),
                    )?;
                    tx.execute(
                        "INSERT INTO store_items (owner, name, position, handle, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![owner_bytes, item_name, position, handle_bytes, now_secs()],
                    )?;
                    UpsertResult::Inserted
                }
            };

            tx.execute(
                "INSERT OR IGNORE INTO acl_grants (handle, principal) VALUES (?1, ?2)",
                params![handle_bytes, owner_bytes],
            )?;

            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn get_store(&self, owner: &Principal) -> Result<Option<StoreRecord>> {
        let owner = *owner;

        self.run(move |conn| {
            let owner_bytes = owner.as_bytes().as_slice();
            // Both reads share one snapshot.
            let tx = conn.transaction()?;

            let name: Option<String> = tx
                .query_row(
                    "SELECT name FROM stores WHERE owner = ?1",
                    params![owner_bytes],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(name) = name else {
                return Ok(None);
            };

            let items = {
                let mut stmt = tx.prepare(
                    "SELECT name, handle FROM store_items WHERE owner = ?1 ORDER BY position",
                )?;
                let rows = stmt.query_map(params![owner_bytes], |row| {
                    Ok(StoreItem {
                        name: row.get(0)?,
                        handle: handle_from_blob(row.get(1)?, 1, "handle")?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            tx.commit()?;
            Ok(Some(StoreRecord { owner, name, items }))
        })
        .await
    }

    async fn get_item(
        &self,
        owner: &Principal,
        item_name: &str,
    ) -> Result<Option<CiphertextHandle>> {
        let owner = *owner;
        let item_name = item_name.to_string();

        self.run(move |conn| {
            let handle: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT handle FROM store_items WHERE owner = ?1 AND name = ?2",
                    params![owner.as_bytes().as_slice(), item_name],
                    |row| row.get(0),
                )
                .optional()?;

            handle
                .map(|b| handle_from_blob(b, 0, "handle").map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn has_store(&self, owner: &Principal) -> Result<bool> {
        let owner = *owner;

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM stores WHERE owner = ?1",
                params![owner.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn is_authorized(
        &self,
        handle: &CiphertextHandle,
        principal: &Principal,
    ) -> Result<bool> {
        let handle = *handle;
        let principal = *principal;

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM acl_grants WHERE handle = ?1 AND principal = ?2",
                params![handle.as_bytes().as_slice(), principal.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn grantees(&self, handle: &CiphertextHandle) -> Result<Vec<Principal>> {
        let handle = *handle;

        self.run(move |conn| {
            let mut stmt =
                conn.prepare("SELECT principal FROM acl_grants WHERE handle = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![handle.as_bytes().as_slice()], |row| {
                principal_from_blob(row.get(0)?, 0, "principal")
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

#[async_trait]
impl CiphertextVault for SqliteLedger {
    async fn put_ciphertext(&self, record: &CiphertextRecord) -> Result<InsertResult> {
        let record = record.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO ciphertexts
                    (handle, submitter, scope, payload, registered, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.handle.as_bytes().as_slice(),
                    record.submitter.as_bytes().as_slice(),
                    record.scope.as_bytes().as_slice(),
                    record.payload,
                    record.registered as i64,
                    record.created_at as i64,
                ],
            )?;

            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get_ciphertext(&self, handle: &CiphertextHandle) -> Result<Option<CiphertextRecord>> {
        let handle = *handle;

        self.run(move |conn| {
            conn.query_row(
                "SELECT handle, submitter, scope, payload, registered, created_at
                 FROM ciphertexts WHERE handle = ?1",
                params![handle.as_bytes().as_slice()],
                row_to_ciphertext,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn mark_registered(&self, handle: &CiphertextHandle) -> Result<bool> {
        let handle = *handle;

        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE ciphertexts SET registered = 1 WHERE handle = ?1",
                params![handle.as_bytes().as_slice()],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    async fn prune_unregistered(&self, created_before: u64) -> Result<usize> {
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM ciphertexts WHERE registered = 0 AND created_at < ?1",
                params![created_before as i64],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn consume_authorization(
        &self,
        digest: &Blake3Hash,
        expires_at: u64,
        now: u64,
    ) -> Result<bool> {
        let digest = *digest;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            tx.execute(
                "DELETE FROM consumed_authorizations WHERE expires_at < ?1",
                params![now as i64],
            )?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO consumed_authorizations (digest, expires_at)
                 VALUES (?1, ?2)",
                params![digest.as_bytes().as_slice(), expires_at as i64],
            )?;

            tx.commit()?;
            Ok(inserted > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn owner(b: u8) -> Principal {
        Principal::from_bytes([b; 20])
    }

    fn handle(b: u8) -> CiphertextHandle {
        CiphertextHandle::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let alice = owner(1);

        assert!(!ledger.has_store(&alice).await.unwrap());
        assert_eq!(
            ledger.create_store(&alice, "Alice Shop").await.unwrap(),
            CreateResult::Created
        );
        assert_eq!(
            ledger.create_store(&alice, "Again").await.unwrap(),
            CreateResult::AlreadyExists
        );

        assert_eq!(
            ledger.rename_store(&alice, "Alice Market").await.unwrap(),
            RenameResult::Renamed {
                previous: "Alice Shop".into()
            }
        );
        assert_eq!(
            ledger.rename_store(&owner(2), "x").await.unwrap(),
            RenameResult::StoreMissing
        );

        let store = ledger.get_store(&alice).await.unwrap().unwrap();
        assert_eq!(store.name, "Alice Market");
        assert!(store.items.is_empty());
    }

    #[tokio::test]
    async fn test_items_keep_insertion_order() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let alice = owner(1);
        ledger.create_store(&alice, "s").await.unwrap();

        ledger.upsert_item(&alice, "pear", &handle(1)).await.unwrap();
        ledger.upsert_item(&alice, "apple", &handle(2)).await.unwrap();
        let replaced = ledger.upsert_item(&alice, "pear", &handle(3)).await.unwrap();
        assert_eq!(replaced, UpsertResult::Replaced { previous: handle(1) });

        let store = ledger.get_store(&alice).await.unwrap().unwrap();
        assert_eq!(store.item_names(), vec!["pear", "apple"]);
        assert_eq!(store.handles(), vec![handle(3), handle(2)]);
    }

    #[tokio::test]
    async fn test_grants_follow_writes() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let alice = owner(1);

        assert_eq!(
            ledger.upsert_item(&alice, "apple", &handle(1)).await.unwrap(),
            UpsertResult::StoreMissing
        );
        assert!(!ledger.is_authorized(&handle(1), &alice).await.unwrap());

        ledger.create_store(&alice, "s").await.unwrap();
        ledger.upsert_item(&alice, "apple", &handle(1)).await.unwrap();
        ledger.upsert_item(&alice, "apple", &handle(2)).await.unwrap();

        assert!(ledger.is_authorized(&handle(1), &alice).await.unwrap());
        assert!(ledger.is_authorized(&handle(2), &alice).await.unwrap());
        assert!(!ledger.is_authorized(&handle(2), &owner(2)).await.unwrap());
        assert_eq!(ledger.grantees(&handle(2)).await.unwrap(), vec![alice]);
    }

    #[tokio::test]
    async fn test_consumed_authorizations_are_pruned_after_expiry() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let digest = Blake3Hash::hash(b"auth");

        assert!(ledger.consume_authorization(&digest, 100, 50).await.unwrap());
        assert!(!ledger.consume_authorization(&digest, 100, 60).await.unwrap());
        // Past expiry the entry is dropped; the service rejects it as expired first.
        assert!(ledger.consume_authorization(&digest, 100, 101).await.unwrap());
    }

    #[tokio::test]
    async fn test_ciphertext_roundtrip() {
        let ledger = SqliteLedger::open_memory().unwrap();
        let record = CiphertextRecord {
            handle: handle(5),
            submitter: owner(1),
            scope: ContractId::derive("inventory"),
            payload: vec![9, 8, 7],
            registered: false,
            created_at: 1_700_000_000,
        };

        assert_eq!(
            ledger.put_ciphertext(&record).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            ledger.get_ciphertext(&handle(5)).await.unwrap(),
            Some(record.clone())
        );
        assert!(ledger.mark_registered(&handle(5)).await.unwrap());
        assert!(
            ledger
                .get_ciphertext(&handle(5))
                .await
                .unwrap()
                .unwrap()
                .registered
        );
    }

    #[tokio::test]
    async fn test_prune_unregistered_ciphertexts() {
        let ledger = SqliteLedger::open_memory().unwrap();
        for (b, created_at) in [(1u8, 100u64), (2, 100), (3, 500)] {
            let record = CiphertextRecord {
                handle: handle(b),
                submitter: owner(1),
                scope: ContractId::derive("inventory"),
                payload: vec![b],
                registered: false,
                created_at,
            };
            ledger.put_ciphertext(&record).await.unwrap();
        }
        ledger.mark_registered(&handle(2)).await.unwrap();

        assert_eq!(ledger.prune_unregistered(500).await.unwrap(), 1);
        assert_eq!(ledger.get_ciphertext(&handle(1)).await.unwrap(), None);
        assert!(ledger.get_ciphertext(&handle(2)).await.unwrap().is_some());
        assert!(ledger.get_ciphertext(&handle(3)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("oblivion.db");
        let alice = owner(1);

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.create_store(&alice, "Alice Shop").await.unwrap();
            ledger.upsert_item(&alice, "apple", &handle(1)).await.unwrap();
        }

        let ledger = SqliteLedger::open(&path).unwrap();
        let store = ledger.get_store(&alice).await.unwrap().unwrap();
        assert_eq!(store.name, "Alice Shop");
        assert_eq!(store.handles(), vec![handle(1)]);
        assert!(ledger.is_authorized(&handle(1), &alice).await.unwrap());
    }
}
