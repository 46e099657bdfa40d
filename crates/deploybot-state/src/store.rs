//! DeployStore: persistence for per-channel deployment records.
//!
//! [`DeployStore`] is the capability set the coordinator depends on: get,
//! set, and delete-returning-previous, keyed by channel. It carries no
//! rules of its own. [`RedbStore`] is the on-disk implementation; values
//! are JSON-serialized into redb's `&[u8]` value column.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::DEPLOYMENTS;
use crate::types::Deployment;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Durable mapping from channel identifier to at most one deployment.
pub trait DeployStore: Send + Sync {
    /// The record stored for `channel`, if any.
    fn get(&self, channel: &str) -> StateResult<Option<Deployment>>;

    /// Insert or overwrite the record for `channel`. Last write wins.
    fn set(&self, channel: &str, deployment: &Deployment) -> StateResult<()>;

    /// Remove the record for `channel`, returning what was there.
    fn delete(&self, channel: &str) -> StateResult<Option<Deployment>>;
}

/// Deploy store backed by a single redb file.
///
/// Clones share one database handle; the file is released when the last
/// clone is dropped.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "deploy store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory deploy store opened");
        Ok(store)
    }

    /// Create the deployments table if it doesn't exist yet, so reads on a
    /// fresh file find an empty table rather than failing.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl DeployStore for RedbStore {
    fn get(&self, channel: &str) -> StateResult<Option<Deployment>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
        match table.get(channel).map_err(map_err!(Read))? {
            Some(guard) => {
                let deployment: Deployment =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(deployment))
            }
            None => Ok(None),
        }
    }

    fn set(&self, channel: &str, deployment: &Deployment) -> StateResult<()> {
        let value = serde_json::to_vec(deployment).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            table
                .insert(channel, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%channel, "deployment stored");
        Ok(())
    }

    fn delete(&self, channel: &str) -> StateResult<Option<Deployment>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed = {
            let mut table = txn.open_table(DEPLOYMENTS).map_err(map_err!(Table))?;
            let guard = table.remove(channel).map_err(map_err!(Write))?;
            match guard {
                Some(guard) => Some(
                    serde_json::from_slice::<Deployment>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%channel, existed = removed.is_some(), "deployment deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operator;
    use chrono::Utc;

    fn stamped(id: &str, name: &str, subject: &str) -> Deployment {
        let mut d = Deployment::new(Operator::new(id, name), subject);
        d.started_at = Some(Utc::now());
        d
    }

    #[test]
    fn get_missing_returns_none() {
        let store = RedbStore::open_in_memory().unwrap();
        assert!(store.get("key1").unwrap().is_none());
    }

    #[test]
    fn set_then_get() {
        let store = RedbStore::open_in_memory().unwrap();
        let d = stamped("1", "Test User", "Deploy subject");

        store.set("key1", &d).unwrap();

        assert_eq!(store.get("key1").unwrap(), Some(d));
    }

    #[test]
    fn set_overwrites_existing() {
        let store = RedbStore::open_in_memory().unwrap();
        store
            .set("key1", &stamped("1", "Test User", "Deploy subject"))
            .unwrap();

        let updated = stamped("2", "First User", "Updated deploy subject");
        store.set("key1", &updated).unwrap();

        assert_eq!(store.get("key1").unwrap(), Some(updated));
    }

    #[test]
    fn keys_are_independent() {
        let store = RedbStore::open_in_memory().unwrap();
        let first = stamped("2", "First User", "Updated deploy subject");
        let second = stamped("3", "Second User", "Another deploy");

        store.set("key1", &first).unwrap();
        store.set("key2", &second).unwrap();

        assert_eq!(store.get("key2").unwrap(), Some(second));
        assert_eq!(store.get("key1").unwrap(), Some(first));
    }

    #[test]
    fn delete_returns_removed_record() {
        let store = RedbStore::open_in_memory().unwrap();
        assert!(store.delete("key1").unwrap().is_none());

        let first = stamped("1", "First User", "Deploy subject");
        store.set("key1", &first).unwrap();
        store
            .set("key2", &stamped("2", "Second User", "Another deploy"))
            .unwrap();

        assert_eq!(store.delete("key1").unwrap(), Some(first));
        assert!(store.get("key1").unwrap().is_none());
        // key2 untouched
        assert!(store.get("key2").unwrap().is_some());
        assert!(store.delete("key1").unwrap().is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("deploys.redb");
        let d = stamped("1", "Alice", "deploy v2");

        {
            let store = RedbStore::open(&db_path).unwrap();
            store.set("ops", &d).unwrap();
        }

        // Reopen the same database file.
        let store = RedbStore::open(&db_path).unwrap();
        assert_eq!(store.get("ops").unwrap(), Some(d));
    }

    #[test]
    fn open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fresh.redb");

        let store = RedbStore::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert!(store.get("anything").unwrap().is_none());
    }

    #[test]
    fn open_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = RedbStore::open(dir.path()).err().unwrap();
        assert!(matches!(err, StateError::Open(_)));
    }

    #[test]
    fn open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("no/such/dir/deploys.redb");
        assert!(RedbStore::open(&db_path).is_err());
    }
}
