//! Versioned SQLite schema.
//!
//! `MIGRATIONS[i]` takes the schema from version `i` to `i + 1`. Applied
//! versions are recorded in `schema_migrations`, all pending steps run in one
//! transaction.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};

use crate::error::{Result, StoreError};

const MIGRATIONS: &[&str] = &[
    // v1: stores, ordered items, the append-only ACL and the service tables.
    r#"
    CREATE TABLE stores (
        owner       BLOB PRIMARY KEY,       -- 20-byte principal
        name        TEXT NOT NULL,
        created_at  INTEGER NOT NULL
    );

    CREATE TABLE store_items (
        owner       BLOB NOT NULL REFERENCES stores(owner),
        name        TEXT NOT NULL,
        position    INTEGER NOT NULL,       -- first-insertion order
        handle      BLOB NOT NULL,
        updated_at  INTEGER NOT NULL,
        PRIMARY KEY (owner, name),
        UNIQUE (owner, position)
    );

    CREATE TABLE acl_grants (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        handle      BLOB NOT NULL,
        principal   BLOB NOT NULL,
        UNIQUE (handle, principal)
    );
    CREATE INDEX idx_acl_handle ON acl_grants(handle);

    CREATE TABLE ciphertexts (
        handle      BLOB PRIMARY KEY,
        submitter   BLOB NOT NULL,
        scope       BLOB NOT NULL,
        payload     BLOB NOT NULL,
        registered  INTEGER NOT NULL DEFAULT 0,
        created_at  INTEGER NOT NULL
    );

    CREATE TABLE consumed_authorizations (
        digest      BLOB PRIMARY KEY,
        expires_at  INTEGER NOT NULL
    );
    CREATE INDEX idx_consumed_expiry ON consumed_authorizations(expires_at);
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring `conn` up to [`CURRENT_VERSION`]. A no-op when already there.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  INTEGER NOT NULL
        );",
    )?;

    let applied = schema_version(conn)?;
    if applied > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema is at v{}, this build only knows up to v{}",
            applied, CURRENT_VERSION
        )));
    }

    let pending = &MIGRATIONS[applied as usize..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (offset, script) in pending.iter().enumerate() {
        let version = applied + offset as u32 + 1;
        tx.execute_batch(script)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_secs()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?)
}

/// Wall-clock Unix seconds; zero if the clock reads before the epoch.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}
