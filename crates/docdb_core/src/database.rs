//! Database facade.

use crate::collection::Collection;
use crate::error::{CoreError, CoreResult};
use docdb_storage::{Store, StoreConfig, WalEvent, DEFAULT_KEYSPACE, INDEX_KEYSPACE_INFIX};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::warn;

/// The main database handle.
///
/// `Database` owns the storage adapter and the set of collections.
/// Opening is directory-based; everything lives in a single substrate
/// directory.
///
/// # Example
///
/// ```rust,ignore
/// use docdb_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("./test_db"))?;
/// let products = db.create_collection("products")?;
/// products.create_index("price")?;
/// db.close()?;
/// ```
pub struct Database {
    store: Arc<Store>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens (or creates) a database at the given directory with default
    /// tuning.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens a database with custom storage tuning.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let store = Store::open(path, config)?;
        Ok(Self {
            store: Arc::new(store),
            collections: RwLock::new(HashMap::new()),
            is_open: RwLock::new(true),
        })
    }

    /// Creates a collection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for reserved names (empty, containing
    /// the index infix, or the substrate's root keyspace) and
    /// `AlreadyExists` when the collection is present.
    pub fn create_collection(&self, name: &str) -> CoreResult<Arc<Collection>> {
        self.ensure_open()?;
        validate_collection_name(name)?;

        self.store.create_keyspace(name)?;
        let collection = Arc::new(Collection::new(name, Arc::clone(&self.store)));
        self.collections
            .write()
            .insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Returns a handle to an existing collection.
    ///
    /// Collections created by earlier processes are bound lazily from
    /// the substrate's keyspaces.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no such collection exists.
    pub fn collection(&self, name: &str) -> CoreResult<Arc<Collection>> {
        self.ensure_open()?;
        if let Some(collection) = self.collections.read().get(name) {
            return Ok(Arc::clone(collection));
        }
        if !self.store.keyspace_exists(name) || name.contains(INDEX_KEYSPACE_INFIX) {
            return Err(CoreError::not_found(format!("collection {name}")));
        }
        let collection = Arc::new(Collection::new(name, Arc::clone(&self.store)));
        self.collections
            .write()
            .insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Drops a collection, its documents, and all of its indexes.
    ///
    /// Indexes are dropped first; failures there are logged and the
    /// document keyspace is dropped regardless.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no such collection exists.
    pub fn drop_collection(&self, name: &str) -> CoreResult<()> {
        let collection = self.collection(name)?;
        self.collections.write().remove(name);

        for field in collection.list_indexes() {
            if let Err(err) = collection.delete_index(&field) {
                warn!(collection = name, field = %field, error = %err,
                    "failed to drop index while dropping collection");
            }
        }
        self.store.drop_keyspace(name)?;
        Ok(())
    }

    /// Names of all collections, sorted. Index keyspaces and the
    /// substrate's root keyspace are filtered out.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.store
            .keyspace_names()
            .into_iter()
            .filter(|name| name != DEFAULT_KEYSPACE && !name.contains(INDEX_KEYSPACE_INFIX))
            .collect()
    }

    /// Starts the WAL tailer, which dispatches committed mutations to
    /// subscribers.
    pub fn start_wal_tailer(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.store.start_wal_tailer()?;
        Ok(())
    }

    /// Stops the WAL tailer. No-op when it is not running.
    pub fn stop_wal_tailer(&self) {
        self.store.stop_wal_tailer();
    }

    /// Subscribes to the WAL event feed.
    pub fn subscribe_wal(&self) -> Receiver<WalEvent> {
        self.store.subscribe_wal()
    }

    /// Closes the database: joins background work, flushes every
    /// keyspace, syncs the write-ahead log, and invalidates all
    /// collection handles. Idempotent.
    ///
    /// Substrate close errors are returned, but in-memory cleanup
    /// happens regardless.
    pub fn close(&self) -> CoreResult<()> {
        {
            let mut is_open = self.is_open.write();
            if !*is_open {
                return Ok(());
            }
            *is_open = false;
        }

        let collections: Vec<Arc<Collection>> = self.collections.write().drain().map(|(_, c)| c).collect();
        for collection in &collections {
            collection.wait_for_export();
        }
        drop(collections);

        self.store.close()?;
        Ok(())
    }

    /// Returns true while the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("collections", &self.collection_names())
            .finish_non_exhaustive()
    }
}

fn validate_collection_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_argument("collection name is empty"));
    }
    if name == DEFAULT_KEYSPACE {
        return Err(CoreError::invalid_argument(format!(
            "collection name {name} is reserved"
        )));
    }
    if name.contains(INDEX_KEYSPACE_INFIX) {
        return Err(CoreError::invalid_argument(format!(
            "collection name must not contain {INDEX_KEYSPACE_INFIX}"
        )));
    }
    Ok(())
}
