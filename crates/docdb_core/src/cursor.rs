//! Cursor over a collection's documents.

use crate::document::Document;
use crate::error::CoreResult;
use docdb_storage::KeyspaceCursor;

/// An ordered cursor over every document of a collection.
///
/// Yields documents in id order. Items that fail to decode surface as
/// `Err` items; iteration continues past them. The cursor borrows the
/// collection's keyspace handle and must not outlive the open database.
pub struct DocumentCursor<'a> {
    inner: KeyspaceCursor<'a>,
    done: bool,
}

impl<'a> DocumentCursor<'a> {
    pub(crate) fn new(inner: KeyspaceCursor<'a>) -> Self {
        Self { inner, done: false }
    }
}

impl Iterator for DocumentCursor<'_> {
    type Item = CoreResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.inner.valid() {
            self.done = true;
            // Distinguish exhaustion from an iteration error.
            return match self.inner.status() {
                Ok(()) => None,
                Err(err) => Some(Err(err.into())),
            };
        }
        let item = self
            .inner
            .value()
            .map(Document::from_bytes)
            .unwrap_or_else(|| Err(crate::error::CoreError::internal("cursor without value")));
        self.inner.next();
        Some(item)
    }
}
