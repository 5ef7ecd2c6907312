//! Collections: named sets of documents with secondary indexes.

mod export;

use crate::cursor::DocumentCursor;
use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::id::generate_id;
use crate::query::{filter, planner};
use docdb_codec::{index_key, Value, INDEX_KEY_SEPARATOR};
use docdb_storage::{Batch, Store, INDEX_KEYSPACE_INFIX};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

/// Name of the index keyspace for `(collection, field)`.
pub(crate) fn index_keyspace_name(collection: &str, field: &str) -> String {
    format!("{collection}{INDEX_KEYSPACE_INFIX}{field}")
}

/// Counts from a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Documents imported successfully.
    pub imported: u64,
    /// Items that failed (non-objects, ill-typed ids, write failures).
    pub failed: u64,
}

/// A named collection of documents.
///
/// Handles are obtained from [`crate::Database`] and share the
/// database's storage adapter. All operations are synchronous and may
/// block on substrate I/O.
pub struct Collection {
    name: String,
    store: Arc<Store>,
    /// Serializes the read-merge-write path of `update_document`.
    update_lock: Mutex<()>,
    export_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, store: Arc<Store>) -> Self {
        Self {
            name: name.into(),
            store,
            update_lock: Mutex::new(()),
            export_worker: Mutex::new(None),
        }
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persists a new document.
    ///
    /// Assigns a generated id when the document has none, and mirrors
    /// the id into the body under `_id`. The document write and all of
    /// its index entries are applied in one atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` when a document with this id is present,
    /// `InvalidArgument` when the body is not an object or contains NaN.
    pub fn create_document(&self, doc: &mut Document) -> CoreResult<()> {
        if doc.id().is_empty() {
            doc.set_id(generate_id());
        }
        doc.mirror_id()?;

        if self.store.get(&self.name, doc.id().as_bytes())?.is_some() {
            return Err(CoreError::already_exists(format!(
                "document {} in collection {}",
                doc.id(),
                self.name
            )));
        }
        self.persist(doc, None)
    }

    /// Reads a document by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing id and `Corruption` when the
    /// stored bytes fail to decode.
    pub fn read_document(&self, id: &str) -> CoreResult<Document> {
        match self.store.get(&self.name, id.as_bytes())? {
            Some(bytes) => Document::from_bytes(&bytes),
            None => Err(CoreError::not_found(format!(
                "document {id} in collection {}",
                self.name
            ))),
        }
    }

    /// Applies an operator-based update to a document.
    ///
    /// The read-merge-write sequence holds the collection's update mutex
    /// so concurrent updates to the collection serialize. With `upsert`,
    /// a missing document starts from an empty body.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id is absent and `upsert` is false,
    /// `InvalidArgument` for malformed update trees.
    pub fn update_document(&self, id: &str, update: &Value, upsert: bool) -> CoreResult<()> {
        let _guard = self.update_lock.lock();

        let (mut doc, previous) = match self.read_document(id) {
            Ok(doc) => {
                let previous = doc.clone();
                (doc, Some(previous))
            }
            Err(err) if err.is_not_found() && upsert => (Document::empty(id), None),
            Err(err) => return Err(err),
        };

        doc.apply_update(update)?;
        doc.mirror_id()?;
        self.persist(&doc, previous.as_ref())
    }

    /// Deletes a document and its index entries atomically.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the id is absent.
    pub fn delete_document(&self, id: &str) -> CoreResult<()> {
        let doc = self.read_document(id)?;

        let mut batch = Batch::new();
        self.stage_index_removals(&mut batch, &doc)?;
        batch.delete(self.name.clone(), id.as_bytes().to_vec());
        self.store.write(&batch)?;
        Ok(())
    }

    /// Writes the document and its index maintenance in one batch.
    ///
    /// `previous` carries the stored version being replaced; its index
    /// entries are removed so each document keeps exactly one entry per
    /// indexed scalar field.
    fn persist(&self, doc: &Document, previous: Option<&Document>) -> CoreResult<()> {
        let mut batch = Batch::new();
        if let Some(previous) = previous {
            self.stage_index_removals(&mut batch, previous)?;
        }
        self.stage_index_inserts(&mut batch, doc)?;
        batch.put(
            self.name.clone(),
            doc.id().as_bytes().to_vec(),
            doc.to_bytes()?,
        );
        self.store.write(&batch)?;
        Ok(())
    }

    fn stage_index_inserts(&self, batch: &mut Batch, doc: &Document) -> CoreResult<()> {
        for field in self.list_indexes() {
            if let Some(entry) = self.index_entry_key(doc, &field)? {
                batch.put(
                    index_keyspace_name(&self.name, &field),
                    entry,
                    doc.id().as_bytes().to_vec(),
                );
            }
        }
        Ok(())
    }

    fn stage_index_removals(&self, batch: &mut Batch, doc: &Document) -> CoreResult<()> {
        for field in self.list_indexes() {
            if let Some(entry) = self.index_entry_key(doc, &field)? {
                batch.delete(index_keyspace_name(&self.name, &field), entry);
            }
        }
        Ok(())
    }

    /// The composite index key `encode(value) || "#" || id` for a
    /// document's field, or `None` when the field is absent or not a
    /// scalar.
    fn index_entry_key(&self, doc: &Document, field: &str) -> CoreResult<Option<Vec<u8>>> {
        let Some(value) = doc.data().get(field) else {
            return Ok(None);
        };
        let Some(mut key) = index_key(value)? else {
            return Ok(None);
        };
        key.push(INDEX_KEY_SEPARATOR);
        key.extend_from_slice(doc.id().as_bytes());
        Ok(Some(key))
    }

    /// Creates a secondary index on a field and backfills it from the
    /// existing documents.
    ///
    /// Backfill is not atomic: on failure the error surfaces and the
    /// partially-built index keyspace is left for the caller to drop.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` when the index is present.
    pub fn create_index(&self, field: &str) -> CoreResult<()> {
        let keyspace = index_keyspace_name(&self.name, field);
        self.store.create_keyspace(&keyspace)?;

        for item in self.cursor()? {
            let doc = item?;
            if let Some(entry) = self.index_entry_key(&doc, field)? {
                self.store
                    .put(&keyspace, &entry, doc.id().as_bytes())?;
            }
        }
        Ok(())
    }

    /// Drops a secondary index.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no index exists on the field.
    pub fn delete_index(&self, field: &str) -> CoreResult<()> {
        let keyspace = index_keyspace_name(&self.name, field);
        self.store.drop_keyspace(&keyspace)?;
        Ok(())
    }

    /// Names of the fields with a declared index, sorted.
    #[must_use]
    pub fn list_indexes(&self) -> Vec<String> {
        let prefix = format!("{}{}", self.name, INDEX_KEYSPACE_INFIX);
        self.store
            .keyspace_names()
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Evaluates a filter tree and returns matching document ids.
    ///
    /// Top-level sibling operators evaluate in key order and their
    /// results are concatenated without de-duplication; use `$and` /
    /// `$or` for explicit boolean composition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed filters or leaves on
    /// unindexed fields.
    pub fn find(&self, filter_tree: &Value) -> CoreResult<Vec<String>> {
        let exprs = filter::parse_filter(filter_tree)?;
        planner::execute(&self.store, &self.name, &exprs)
    }

    /// Opens a cursor over every document, in id order.
    pub fn cursor(&self) -> CoreResult<DocumentCursor<'_>> {
        Ok(DocumentCursor::new(self.store.iter(&self.name)?))
    }

    /// Reads up to `limit` documents. Items that fail to decode are
    /// logged and skipped.
    pub fn read_all_documents(&self, limit: u64) -> CoreResult<Vec<Document>> {
        let mut docs = Vec::new();
        let mut seen: u64 = 0;
        for item in self.cursor()? {
            if seen >= limit {
                break;
            }
            seen += 1;
            match item {
                Ok(doc) => docs.push(doc),
                Err(err) => {
                    warn!(collection = %self.name, error = %err, "skipping unreadable document");
                }
            }
        }
        Ok(docs)
    }

    /// Imports documents from a JSON file containing an array of
    /// objects. Each object becomes a document body; an `_id` field
    /// supplies the id, otherwise one is generated.
    ///
    /// Per-item failures are logged and counted, not fatal.
    ///
    /// # Errors
    ///
    /// Returns `Io` when the file cannot be read and `NotSupported`
    /// when it does not hold a JSON array.
    pub fn import_from_json_file(&self, path: &Path) -> CoreResult<ImportSummary> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| CoreError::io(format!("could not open {}: {err}", path.display())))?;
        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|err| CoreError::not_supported(format!("invalid JSON: {err}")))?;
        let serde_json::Value::Array(items) = parsed else {
            return Err(CoreError::not_supported(format!(
                "file must contain a JSON array of objects: {}",
                path.display()
            )));
        };

        let mut summary = ImportSummary::default();
        for item in items {
            if !item.is_object() {
                summary.failed += 1;
                warn!(collection = %self.name, "skipping non-object item in import");
                continue;
            }
            let body = Value::from(item);
            let id = match body.get("_id") {
                Some(Value::String(id)) => id.clone(),
                Some(_) => {
                    summary.failed += 1;
                    warn!(collection = %self.name, "skipping item with non-string _id");
                    continue;
                }
                None => String::new(),
            };
            let mut doc = Document::new(id, body);
            match self.create_document(&mut doc) {
                Ok(()) => summary.imported += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(collection = %self.name, id = %doc.id(), error = %err,
                        "failed to import document");
                }
            }
        }
        Ok(summary)
    }

    /// Begins a background export of every document body into
    /// `<dir>/<collection>.json`.
    ///
    /// The worker streams through a cursor into a `.dump` file and
    /// renames it on success; a failed export leaves no `.json` behind.
    /// A previous in-flight export is joined first.
    pub fn export_to_json_async(&self, dir: &Path) -> CoreResult<()> {
        self.wait_for_export();

        let store = Arc::clone(&self.store);
        let name = self.name.clone();
        let dir = dir.to_path_buf();
        let handle = std::thread::Builder::new()
            .name(format!("docdb-export-{name}"))
            .spawn(move || export::run_export(&store, &name, &dir))
            .map_err(|err| CoreError::io(format!("spawn export worker: {err}")))?;
        *self.export_worker.lock() = Some(handle);
        Ok(())
    }

    /// Blocks until the in-flight export (if any) finishes.
    pub fn wait_for_export(&self) {
        if let Some(handle) = self.export_worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.wait_for_export();
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("indexes", &self.list_indexes())
            .finish_non_exhaustive()
    }
}
