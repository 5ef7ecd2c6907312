//! # DocDB Storage
//!
//! Storage adapter for DocDB over an ordered key-value substrate.
//!
//! This crate wraps the substrate (an LSM engine with column-family-like
//! keyspaces) behind [`Store`]:
//!
//! - Keyspace lifecycle (create/drop/list), with a durable name↔id
//!   registry
//! - Point put/get/delete and atomic multi-keyspace [`Batch`] writes
//! - Ordered iteration via [`KeyspaceCursor`]
//! - Change-data-capture: a background [WAL tailer](crate::wal) that
//!   decodes committed log batches and dispatches events to subscribers
//!
//! Options are tuned for small-memory edge deployments; see
//! [`StoreConfig`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod cursor;
mod error;
mod store;
pub mod wal;

pub use batch::{Batch, BatchOp};
pub use config::StoreConfig;
pub use cursor::KeyspaceCursor;
pub use error::{StorageError, StorageResult};
pub use store::{Store, DEFAULT_KEYSPACE, INDEX_KEYSPACE_INFIX};
pub use wal::{WalEvent, WalFeed, WalOp};
