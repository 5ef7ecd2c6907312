//! # DocDB Codec
//!
//! Value model and binary codecs for DocDB.
//!
//! This crate provides:
//! - [`Value`], the dynamic document value tree
//! - A self-describing MessagePack encoder/decoder for values
//! - The persisted document envelope (`{id, data}`)
//! - The order-preserving index key codec used by secondary indexes
//! - Conversions to and from `serde_json::Value`
//!
//! ## MessagePack rules
//!
//! - Integers use the shortest encoding that fits
//! - Doubles are always written as float64; NaN is rejected
//! - Map keys must be strings
//! - No bin/ext families (the value model has no byte-string type)
//!
//! ## Usage
//!
//! ```
//! use docdb_codec::{from_msgpack, to_msgpack, Value};
//!
//! let value = Value::Int(42);
//! let bytes = to_msgpack(&value).unwrap();
//! let decoded = from_msgpack(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
mod json;
mod key;
mod value;

pub use decoder::{from_msgpack, MsgpackDecoder};
pub use document::{decode_document, encode_document};
pub use encoder::{to_msgpack, MsgpackEncoder};
pub use error::{CodecError, CodecResult};
pub use json::{to_json_string, to_json_string_pretty};
pub use key::{decode_double_key, decode_int_key, index_key, INDEX_KEY_SEPARATOR};
pub use value::Value;
