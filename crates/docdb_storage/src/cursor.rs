//! Ordered iteration over a keyspace.

use crate::error::{StorageError, StorageResult};
use rocksdb::{DBRawIteratorWithThreadMode, DBWithThreadMode, MultiThreaded};

pub(crate) type Db = DBWithThreadMode<MultiThreaded>;

/// An ordered cursor over a single keyspace.
///
/// The cursor borrows the store's substrate handle and must not outlive
/// it. All seeks are total-order seeks, so iteration crosses prefix
/// boundaries correctly despite the configured prefix extractor.
pub struct KeyspaceCursor<'a> {
    raw: DBRawIteratorWithThreadMode<'a, Db>,
}

impl<'a> KeyspaceCursor<'a> {
    pub(crate) fn new(raw: DBRawIteratorWithThreadMode<'a, Db>) -> Self {
        Self { raw }
    }

    /// Positions the cursor at the first entry.
    pub fn seek_to_first(&mut self) {
        self.raw.seek_to_first();
    }

    /// Positions the cursor at the last entry.
    pub fn seek_to_last(&mut self) {
        self.raw.seek_to_last();
    }

    /// Positions the cursor at the first entry `>= key`.
    pub fn seek(&mut self, key: &[u8]) {
        self.raw.seek(key);
    }

    /// Positions the cursor at the last entry `<= key`.
    pub fn seek_for_prev(&mut self, key: &[u8]) {
        self.raw.seek_for_prev(key);
    }

    /// Returns true while the cursor points at an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.raw.valid()
    }

    /// Advances to the next entry.
    pub fn next(&mut self) {
        self.raw.next();
    }

    /// Steps back to the previous entry.
    pub fn prev(&mut self) {
        self.raw.prev();
    }

    /// The current key, if the cursor is valid.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.raw.key()
    }

    /// The current value, if the cursor is valid.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.raw.value()
    }

    /// Surfaces any iteration error encountered by the substrate.
    ///
    /// An exhausted cursor with no error returns `Ok`.
    pub fn status(&self) -> StorageResult<()> {
        self.raw.status().map_err(StorageError::from)
    }
}
