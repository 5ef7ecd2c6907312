//! The storage adapter over the ordered key-value substrate.

use crate::batch::{Batch, BatchOp};
use crate::config::StoreConfig;
use crate::cursor::{Db, KeyspaceCursor};
use crate::error::{StorageError, StorageResult};
use crate::wal::{WalEvent, WalFeed, WalOp, WalTailer};
use parking_lot::{Mutex, RwLock};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, ReadOptions, WriteOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::warn;

/// The substrate's reserved root keyspace. The engine stores no document
/// data here; the adapter keeps its keyspace registry under a reserved
/// key.
pub const DEFAULT_KEYSPACE: &str = "default";

/// Reserved infix marking secondary-index keyspaces.
pub const INDEX_KEYSPACE_INFIX: &str = "__index__";

/// Reserved key in the default keyspace holding the keyspace registry.
const REGISTRY_KEY: &[u8] = b"__docdb_keyspace_registry__";

/// Durable map of keyspace names to substrate keyspace ids.
///
/// Ids mirror the substrate's own assignment: 0 for the default keyspace,
/// then monotonically increasing per creation, never reused. The WAL
/// tailer resolves record keyspace ids through this map, including for
/// records written by earlier processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct KeyspaceRegistry {
    next_id: u32,
    ids: HashMap<String, u32>,
}

impl KeyspaceRegistry {
    fn new() -> Self {
        let mut ids = HashMap::new();
        ids.insert(DEFAULT_KEYSPACE.to_string(), 0);
        Self { next_id: 1, ids }
    }

    fn assign(&mut self, name: &str) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(name.to_string(), id);
        id
    }

    fn remove(&mut self, name: &str) -> Option<u32> {
        self.ids.remove(name)
    }

    pub(crate) fn name_of(&self, id: u32) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, keyspace_id)| **keyspace_id == id)
            .map(|(name, _)| name.as_str())
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ids.keys().cloned().collect();
        names.sort();
        names
    }
}

pub(crate) struct StoreInner {
    pub(crate) db: Db,
    pub(crate) registry: RwLock<KeyspaceRegistry>,
    pub(crate) feed: Arc<WalFeed>,
    is_open: RwLock<bool>,
    config: StoreConfig,
}

impl StoreInner {
    pub(crate) fn keyspace_name(&self, id: u32) -> Option<String> {
        self.registry.read().name_of(id).map(str::to_string)
    }

    fn persist_registry(&self, registry: &KeyspaceRegistry) -> StorageResult<()> {
        let bytes = serde_json::to_vec(registry)
            .map_err(|err| StorageError::io(format!("registry encode: {err}")))?;
        let cf = self
            .db
            .cf_handle(DEFAULT_KEYSPACE)
            .ok_or_else(|| StorageError::not_found("keyspace default"))?;
        self.db
            .put_cf_opt(&cf, REGISTRY_KEY, bytes, &write_options())?;
        Ok(())
    }
}

fn write_options() -> WriteOptions {
    let mut opts = WriteOptions::default();
    // Durability comes from the substrate WAL; per-write fsync is off.
    opts.set_sync(false);
    opts
}

fn iter_read_options() -> ReadOptions {
    let mut opts = ReadOptions::default();
    // A prefix extractor is configured, so ordered scans that cross
    // prefix boundaries must request total-order seeks.
    opts.set_total_order_seek(true);
    opts
}

/// The storage adapter.
///
/// `Store` wraps the substrate database: keyspace lifecycle, point
/// operations, atomic batches, ordered cursors, and the WAL tailer.
/// It is shared by every collection of a database and is internally
/// thread-safe.
pub struct Store {
    inner: Arc<StoreInner>,
    tailer: Mutex<Option<WalTailer>>,
}

impl Store {
    /// Opens (or creates) a store at the given directory.
    ///
    /// All keyspaces present in the substrate are reopened with the same
    /// tuned options. The keyspace registry is loaded from the default
    /// keyspace, or initialized for a fresh database.
    ///
    /// # Errors
    ///
    /// Returns an error if the substrate cannot be opened or the
    /// registry fails to decode.
    pub fn open(path: &Path, config: StoreConfig) -> StorageResult<Self> {
        let opts = config.substrate_options();

        // Listing fails on a fresh directory; treat that as no keyspaces.
        let mut names = Db::list_cf(&opts, path).unwrap_or_default();
        if names.is_empty() {
            names.push(DEFAULT_KEYSPACE.to_string());
        }

        let descriptors: Vec<ColumnFamilyDescriptor> = names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(name.as_str(), config.substrate_options()))
            .collect();
        let db = Db::open_cf_descriptors(&opts, path, descriptors)?;

        let inner = Arc::new(StoreInner {
            db,
            registry: RwLock::new(KeyspaceRegistry::new()),
            feed: Arc::new(WalFeed::new()),
            is_open: RwLock::new(true),
            config,
        });

        let registry = Self::load_registry(&inner, &names)?;
        *inner.registry.write() = registry;

        Ok(Self {
            inner,
            tailer: Mutex::new(None),
        })
    }

    fn load_registry(inner: &StoreInner, names: &[String]) -> StorageResult<KeyspaceRegistry> {
        let cf = inner
            .db
            .cf_handle(DEFAULT_KEYSPACE)
            .ok_or_else(|| StorageError::not_found("keyspace default"))?;
        match inner.db.get_cf(&cf, REGISTRY_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| StorageError::corruption(format!("keyspace registry: {err}"))),
            None => {
                // Fresh database, or one created by other tooling. Assign
                // ids in listing order, which matches the substrate's own
                // assignment for a database whose keyspaces were all
                // created through this adapter.
                let mut registry = KeyspaceRegistry::new();
                for name in names {
                    if name != DEFAULT_KEYSPACE {
                        registry.assign(name);
                    }
                }
                inner.persist_registry(&registry)?;
                Ok(registry)
            }
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if *self.inner.is_open.read() {
            Ok(())
        } else {
            Err(StorageError::Closed)
        }
    }

    fn cf(&self, name: &str) -> StorageResult<Arc<BoundColumnFamily<'_>>> {
        self.inner
            .db
            .cf_handle(name)
            .ok_or_else(|| StorageError::not_found(format!("keyspace {name}")))
    }

    /// Creates a keyspace.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the keyspace is present.
    pub fn create_keyspace(&self, name: &str) -> StorageResult<()> {
        self.ensure_open()?;
        if self.keyspace_exists(name) {
            return Err(StorageError::already_exists(name));
        }

        self.inner
            .db
            .create_cf(name, &self.inner.config.substrate_options())?;

        let id = {
            let mut registry = self.inner.registry.write();
            let id = registry.assign(name);
            self.inner.persist_registry(&registry)?;
            id
        };

        if !name.contains(INDEX_KEYSPACE_INFIX) {
            self.inner.feed.emit(WalEvent {
                op: WalOp::CreateKeyspace,
                keyspace: name.to_string(),
                key: id.to_string(),
                value: String::new(),
            });
        }
        Ok(())
    }

    /// Drops a keyspace and all its data.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the keyspace does not exist.
    pub fn drop_keyspace(&self, name: &str) -> StorageResult<()> {
        self.ensure_open()?;
        if !self.keyspace_exists(name) {
            return Err(StorageError::not_found(format!("keyspace {name}")));
        }

        self.inner.db.drop_cf(name)?;

        let id = {
            let mut registry = self.inner.registry.write();
            let id = registry.remove(name);
            self.inner.persist_registry(&registry)?;
            id
        };

        if !name.contains(INDEX_KEYSPACE_INFIX) {
            self.inner.feed.emit(WalEvent {
                op: WalOp::DropKeyspace,
                keyspace: name.to_string(),
                key: id.map(|id| id.to_string()).unwrap_or_default(),
                value: String::new(),
            });
        }
        Ok(())
    }

    /// Returns true if the keyspace exists.
    #[must_use]
    pub fn keyspace_exists(&self, name: &str) -> bool {
        self.inner.db.cf_handle(name).is_some()
    }

    /// Names of all keyspaces, including `default` and index keyspaces,
    /// sorted.
    #[must_use]
    pub fn keyspace_names(&self) -> Vec<String> {
        self.inner.registry.read().names()
    }

    /// Writes a key/value pair.
    pub fn put(&self, keyspace: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        let cf = self.cf(keyspace)?;
        self.inner
            .db
            .put_cf_opt(&cf, key, value, &write_options())?;
        Ok(())
    }

    /// Reads a key. Returns `None` when the key is absent.
    pub fn get(&self, keyspace: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let cf = self.cf(keyspace)?;
        Ok(self.inner.db.get_cf(&cf, key)?)
    }

    /// Deletes a key. Deleting an absent key is not an error.
    pub fn delete(&self, keyspace: &str, key: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        let cf = self.cf(keyspace)?;
        self.inner.db.delete_cf_opt(&cf, key, &write_options())?;
        Ok(())
    }

    /// Applies a batch atomically.
    ///
    /// Either every operation in the batch becomes durable or none does,
    /// even across a crash.
    pub fn write(&self, batch: &Batch) -> StorageResult<()> {
        self.ensure_open()?;
        let mut substrate_batch = rocksdb::WriteBatch::default();
        for op in batch.ops() {
            match op {
                BatchOp::Put {
                    keyspace,
                    key,
                    value,
                } => {
                    let cf = self.cf(keyspace)?;
                    substrate_batch.put_cf(&cf, key, value);
                }
                BatchOp::Delete { keyspace, key } => {
                    let cf = self.cf(keyspace)?;
                    substrate_batch.delete_cf(&cf, key);
                }
            }
        }
        self.inner.db.write_opt(substrate_batch, &write_options())?;
        Ok(())
    }

    /// Opens a cursor positioned at the first entry of a keyspace.
    pub fn iter(&self, keyspace: &str) -> StorageResult<KeyspaceCursor<'_>> {
        let mut cursor = self.raw_cursor(keyspace)?;
        cursor.seek_to_first();
        Ok(cursor)
    }

    /// Opens a cursor positioned at the first entry `>= seek_key`.
    pub fn iter_from(&self, keyspace: &str, seek_key: &[u8]) -> StorageResult<KeyspaceCursor<'_>> {
        let mut cursor = self.raw_cursor(keyspace)?;
        cursor.seek(seek_key);
        Ok(cursor)
    }

    /// Opens a cursor positioned at the last entry `<= seek_key`.
    pub fn iter_reverse_from(
        &self,
        keyspace: &str,
        seek_key: &[u8],
    ) -> StorageResult<KeyspaceCursor<'_>> {
        let mut cursor = self.raw_cursor(keyspace)?;
        cursor.seek_for_prev(seek_key);
        Ok(cursor)
    }

    fn raw_cursor(&self, keyspace: &str) -> StorageResult<KeyspaceCursor<'_>> {
        self.ensure_open()?;
        let cf = self.cf(keyspace)?;
        Ok(KeyspaceCursor::new(
            self.inner.db.raw_iterator_cf_opt(&cf, iter_read_options()),
        ))
    }

    /// Starts the WAL tailer if it is not already running.
    pub fn start_wal_tailer(&self) -> StorageResult<()> {
        self.ensure_open()?;
        let mut guard = self.tailer.lock();
        if guard.is_none() {
            *guard = Some(WalTailer::spawn(Arc::clone(&self.inner))?);
        }
        Ok(())
    }

    /// Stops the WAL tailer, joining its task. No-op when not running.
    pub fn stop_wal_tailer(&self) {
        if let Some(tailer) = self.tailer.lock().take() {
            tailer.stop();
        }
    }

    /// Returns true while the WAL tailer is running.
    #[must_use]
    pub fn wal_tailer_running(&self) -> bool {
        self.tailer.lock().is_some()
    }

    /// Subscribes to the WAL event feed.
    pub fn subscribe_wal(&self) -> Receiver<WalEvent> {
        self.inner.feed.subscribe()
    }

    /// The substrate's latest committed sequence number.
    #[must_use]
    pub fn latest_sequence(&self) -> u64 {
        self.inner.db.latest_sequence_number()
    }

    /// Flushes every keyspace and syncs the write-ahead log, then marks
    /// the store closed. Idempotent; operations after close fail with
    /// `Closed`.
    pub fn close(&self) -> StorageResult<()> {
        self.stop_wal_tailer();

        let mut is_open = self.inner.is_open.write();
        if !*is_open {
            return Ok(());
        }
        *is_open = false;

        let mut first_error = None;
        for name in self.inner.registry.read().names() {
            if let Some(cf) = self.inner.db.cf_handle(&name) {
                if let Err(err) = self.inner.db.flush_cf(&cf) {
                    warn!(keyspace = %name, error = %err, "flush failed during close");
                    first_error.get_or_insert_with(|| StorageError::from(err));
                }
            }
        }
        if let Err(err) = self.inner.db.flush_wal(true) {
            warn!(error = %err, "WAL sync failed during close");
            first_error.get_or_insert_with(|| StorageError::from(err));
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("is_open", &*self.inner.is_open.read())
            .field("keyspaces", &self.keyspace_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> Store {
        Store::open(dir, StoreConfig::default()).unwrap()
    }

    #[test]
    fn open_close_reopen() {
        let temp = tempdir().unwrap();
        {
            let store = open_store(temp.path());
            store.create_keyspace("orders").unwrap();
            store.close().unwrap();
        }
        {
            let store = open_store(temp.path());
            assert!(store.keyspace_exists("orders"));
            store.close().unwrap();
        }
    }

    #[test]
    fn close_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(
            store.put("x", b"k", b"v"),
            Err(StorageError::Closed)
        ));
    }

    #[test]
    fn point_operations() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("orders").unwrap();

        store.put("orders", b"o1", b"payload").unwrap();
        assert_eq!(
            store.get("orders", b"o1").unwrap(),
            Some(b"payload".to_vec())
        );

        store.delete("orders", b"o1").unwrap();
        assert_eq!(store.get("orders", b"o1").unwrap(), None);
    }

    #[test]
    fn missing_keyspace_is_not_found() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        assert!(matches!(
            store.get("ghost", b"k"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn duplicate_keyspace_rejected() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("orders").unwrap();
        assert!(matches!(
            store.create_keyspace("orders"),
            Err(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn drop_keyspace_removes_data() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("orders").unwrap();
        store.put("orders", b"o1", b"v").unwrap();

        store.drop_keyspace("orders").unwrap();
        assert!(!store.keyspace_exists("orders"));
        assert!(matches!(
            store.drop_keyspace("orders"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn batch_is_atomic_and_ordered() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("docs").unwrap();
        store.create_keyspace("docs__index__price").unwrap();

        let mut batch = Batch::new();
        batch.put("docs", b"d1".to_vec(), b"body".to_vec());
        batch.put("docs__index__price", b"p#d1".to_vec(), b"d1".to_vec());
        store.write(&batch).unwrap();

        assert!(store.get("docs", b"d1").unwrap().is_some());
        assert!(store.get("docs__index__price", b"p#d1").unwrap().is_some());

        // A batch touching a missing keyspace fails before any write.
        let mut bad = Batch::new();
        bad.put("docs", b"d2".to_vec(), b"body".to_vec());
        bad.put("ghost", b"k".to_vec(), b"v".to_vec());
        assert!(store.write(&bad).is_err());
        assert!(store.get("docs", b"d2").unwrap().is_none());
    }

    #[test]
    fn ordered_iteration() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("ks").unwrap();
        for key in [b"b".as_ref(), b"a".as_ref(), b"c".as_ref()] {
            store.put("ks", key, key).unwrap();
        }

        let mut cursor = store.iter("ks").unwrap();
        let mut keys = Vec::new();
        while cursor.valid() {
            keys.push(cursor.key().unwrap().to_vec());
            cursor.next();
        }
        cursor.status().unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn seek_and_reverse_seek() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("ks").unwrap();
        for key in [b"a".as_ref(), b"c".as_ref(), b"e".as_ref()] {
            store.put("ks", key, key).unwrap();
        }

        let cursor = store.iter_from("ks", b"b").unwrap();
        assert_eq!(cursor.key(), Some(b"c".as_ref()));

        let cursor = store.iter_reverse_from("ks", b"d").unwrap();
        assert_eq!(cursor.key(), Some(b"c".as_ref()));

        let cursor = store.iter_reverse_from("ks", b"0").unwrap();
        assert!(!cursor.valid());
    }

    #[test]
    fn empty_keyspace_scan() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        store.create_keyspace("empty").unwrap();

        let cursor = store.iter("empty").unwrap();
        assert!(!cursor.valid());
        cursor.status().unwrap();
    }

    #[test]
    fn registry_survives_reopen() {
        let temp = tempdir().unwrap();
        {
            let store = open_store(temp.path());
            store.create_keyspace("orders").unwrap();
            store.create_keyspace("users").unwrap();
            store.drop_keyspace("users").unwrap();
            store.close().unwrap();
        }
        {
            let store = open_store(temp.path());
            let registry = store.inner.registry.read();
            assert_eq!(registry.name_of(0), Some(DEFAULT_KEYSPACE));
            assert_eq!(registry.name_of(1), Some("orders"));
            // Dropped ids are never reused.
            drop(registry);
            store.create_keyspace("fresh").unwrap();
            assert_eq!(store.inner.registry.read().name_of(3), Some("fresh"));
        }
    }

    #[test]
    fn keyspace_lifecycle_events() {
        let temp = tempdir().unwrap();
        let store = open_store(temp.path());
        let rx = store.subscribe_wal();

        store.create_keyspace("orders").unwrap();
        store.create_keyspace("orders__index__price").unwrap();
        store.drop_keyspace("orders__index__price").unwrap();
        store.drop_keyspace("orders").unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.op, WalOp::CreateKeyspace);
        assert_eq!(first.keyspace, "orders");

        // Index keyspace events are suppressed.
        let second = rx.try_recv().unwrap();
        assert_eq!(second.op, WalOp::DropKeyspace);
        assert_eq!(second.keyspace, "orders");
        assert!(rx.try_recv().is_err());
    }
}
