//! # DocDB Core
//!
//! Embedded document database engine for resource-constrained hosts.
//!
//! This crate provides:
//! - [`Database`]: directory-based open/close lifecycle and the
//!   collection map
//! - [`Collection`]: document CRUD, secondary indexes maintained
//!   synchronously with every write, filter queries, cursors, and JSON
//!   import/export
//! - [`Document`]: the id + body pair with the `$set`/`$unset`/`$push`/
//!   `$pull` partial-update language
//!
//! Documents are schema-free value trees persisted as MessagePack
//! envelopes on an ordered key-value substrate (see `docdb_storage`).
//! Queries run against per-field secondary indexes with
//! order-preserving key encodings, so equality, range, and ordered
//! lookups are index scans rather than collection scans.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docdb_core::{Database, Document, Value};
//! use serde_json::json;
//!
//! let db = Database::open(std::path::Path::new("./my_db"))?;
//! let products = db.create_collection("products")?;
//! products.create_index("price")?;
//!
//! let mut doc = Document::new("p1", Value::from(json!({"price": 49.99})));
//! products.create_document(&mut doc)?;
//!
//! let cheap = products.find(&Value::from(json!({"$lt": {"price": 100.0}})))?;
//! assert_eq!(cheap, vec!["p1"]);
//! db.close()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod cursor;
mod database;
mod document;
mod error;
mod id;
mod query;

pub use collection::{Collection, ImportSummary};
pub use cursor::DocumentCursor;
pub use database::Database;
pub use document::{Document, ID_FIELD};
pub use error::{CoreError, CoreResult};
pub use id::generate_id;
pub use query::Direction;

// The value model and storage tuning surface are part of the public API.
pub use docdb_codec::Value;
pub use docdb_storage::{StoreConfig, WalEvent, WalOp};
