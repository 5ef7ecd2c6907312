//! Query planning and execution over index keyspaces.

use crate::document::Document;
use crate::error::{CoreError, CoreResult};
use crate::query::filter::{Direction, FilterExpr};
use docdb_codec::{index_key, Value, INDEX_KEY_SEPARATOR};
use docdb_storage::Store;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::warn;

/// Executes parsed filter expressions against a collection's indexes.
///
/// Top-level expressions evaluate in declaration order and their results
/// are concatenated; callers should not rely on top-level
/// de-duplication.
pub(crate) fn execute(
    store: &Store,
    collection: &str,
    exprs: &[FilterExpr],
) -> CoreResult<Vec<String>> {
    let mut ids = Vec::new();
    for expr in exprs {
        ids.extend(eval(store, collection, expr)?);
    }
    Ok(ids)
}

fn eval(store: &Store, collection: &str, expr: &FilterExpr) -> CoreResult<Vec<String>> {
    match expr {
        FilterExpr::Eq { field, value }
        | FilterExpr::Gt { field, value }
        | FilterExpr::Lt { field, value } => {
            let candidates = scan_leaf(store, collection, expr, field, value)?;
            Ok(verify_candidates(store, collection, expr, field, value, candidates))
        }
        FilterExpr::And(children) => {
            let mut result: Option<HashSet<String>> = None;
            for child in children {
                let child_ids: HashSet<String> =
                    eval(store, collection, child)?.into_iter().collect();
                result = Some(match result {
                    None => child_ids,
                    Some(seed) => seed.intersection(&child_ids).cloned().collect(),
                });
            }
            Ok(result.unwrap_or_default().into_iter().collect())
        }
        FilterExpr::Or(children) => {
            let mut result = HashSet::new();
            for child in children {
                result.extend(eval(store, collection, child)?);
            }
            Ok(result.into_iter().collect())
        }
        FilterExpr::OrderBy { field, direction } => {
            scan_ordered(store, collection, field, *direction)
        }
    }
}

/// Scans the index keyspace for a leaf predicate, returning candidate
/// document ids in index order.
fn scan_leaf(
    store: &Store,
    collection: &str,
    expr: &FilterExpr,
    field: &str,
    value: &Value,
) -> CoreResult<Vec<String>> {
    let keyspace = require_index(store, collection, field)?;
    let mut prefix = match index_key(value)? {
        Some(encoded) => encoded,
        None => {
            return Err(CoreError::invalid_argument(format!(
                "literal for field {field} is not indexable"
            )))
        }
    };
    prefix.push(INDEX_KEY_SEPARATOR);

    let mut ids = Vec::new();
    match expr {
        FilterExpr::Eq { .. } => {
            let mut cursor = store.iter_from(&keyspace, &prefix)?;
            while cursor.valid() && key_has_prefix(&cursor, &prefix) {
                push_id(&mut ids, cursor.value());
                cursor.next();
            }
            cursor.status()?;
        }
        FilterExpr::Gt { .. } => {
            let mut cursor = store.iter_from(&keyspace, &prefix)?;
            // Strict: step past every entry with the exact prefix.
            while cursor.valid() && key_has_prefix(&cursor, &prefix) {
                cursor.next();
            }
            while cursor.valid() {
                push_id(&mut ids, cursor.value());
                cursor.next();
            }
            cursor.status()?;
        }
        FilterExpr::Lt { .. } => {
            let mut cursor = store.iter_reverse_from(&keyspace, &prefix)?;
            if cursor.valid() && key_has_prefix(&cursor, &prefix) {
                cursor.prev();
            }
            while cursor.valid() {
                push_id(&mut ids, cursor.value());
                cursor.prev();
            }
            cursor.status()?;
        }
        _ => {}
    }
    Ok(ids)
}

fn scan_ordered(
    store: &Store,
    collection: &str,
    field: &str,
    direction: Direction,
) -> CoreResult<Vec<String>> {
    let keyspace = require_index(store, collection, field)?;
    let mut ids = Vec::new();
    match direction {
        Direction::Asc => {
            let mut cursor = store.iter(&keyspace)?;
            while cursor.valid() {
                push_id(&mut ids, cursor.value());
                cursor.next();
            }
            cursor.status()?;
        }
        Direction::Desc => {
            let mut cursor = store.iter(&keyspace)?;
            cursor.seek_to_last();
            while cursor.valid() {
                push_id(&mut ids, cursor.value());
                cursor.prev();
            }
            cursor.status()?;
        }
    }
    Ok(ids)
}

/// Re-checks leaf candidates against the stored documents.
///
/// Raw index order interleaves the encodings of different scalar types,
/// so a range scan can surface documents whose field type does not match
/// the literal. Comparison is strict per type; mismatches drop out,
/// which makes a type-mismatched literal yield an empty result.
fn verify_candidates(
    store: &Store,
    collection: &str,
    expr: &FilterExpr,
    field: &str,
    literal: &Value,
    candidates: Vec<String>,
) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|id| {
            let stored = match store.get(collection, id.as_bytes()) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return false,
                Err(err) => {
                    warn!(collection, id, error = %err, "candidate read failed");
                    return false;
                }
            };
            let document = match Document::from_bytes(&stored) {
                Ok(document) => document,
                Err(err) => {
                    warn!(collection, id, error = %err, "candidate decode failed");
                    return false;
                }
            };
            document
                .data()
                .get(field)
                .and_then(|actual| compare_same_type(actual, literal))
                .is_some_and(|ordering| match expr {
                    FilterExpr::Eq { .. } => ordering == Ordering::Equal,
                    FilterExpr::Gt { .. } => ordering == Ordering::Greater,
                    FilterExpr::Lt { .. } => ordering == Ordering::Less,
                    _ => false,
                })
        })
        .collect()
}

/// Compares two scalars of the same type; `None` when the types differ
/// or are unordered.
fn compare_same_type(actual: &Value, literal: &Value) -> Option<Ordering> {
    match (actual, literal) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn require_index(store: &Store, collection: &str, field: &str) -> CoreResult<String> {
    let keyspace = crate::collection::index_keyspace_name(collection, field);
    if !store.keyspace_exists(&keyspace) {
        return Err(CoreError::invalid_argument(format!(
            "field {field} is not indexed; create an index on it first"
        )));
    }
    Ok(keyspace)
}

fn key_has_prefix(cursor: &docdb_storage::KeyspaceCursor<'_>, prefix: &[u8]) -> bool {
    cursor.key().is_some_and(|key| key.starts_with(prefix))
}

fn push_id(ids: &mut Vec<String>, value: Option<&[u8]>) {
    if let Some(bytes) = value {
        ids.push(String::from_utf8_lossy(bytes).into_owned());
    }
}
