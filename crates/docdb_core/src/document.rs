//! Documents and the partial-update operator language.

use crate::error::{CoreError, CoreResult};
use docdb_codec::{decode_document, encode_document, Value};

/// The reserved body key mirroring the document id.
pub const ID_FIELD: &str = "_id";

/// A document: a string id plus a structured body.
///
/// On persist the id is mirrored into the body under [`ID_FIELD`], so
/// exported bodies remain self-identifying.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    data: Value,
}

impl Document {
    /// Creates a document with the given id and body.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Creates a document with an empty object body.
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Value::object())
    }

    /// The document id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the document id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// The document body.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Mutable access to the document body.
    pub fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    /// Mirrors the id into the body under [`ID_FIELD`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the body is not an object.
    pub(crate) fn mirror_id(&mut self) -> CoreResult<()> {
        let id = self.id.clone();
        match self.data.as_object_mut() {
            Some(fields) => {
                fields.insert(ID_FIELD.to_string(), Value::String(id));
                Ok(())
            }
            None => Err(CoreError::invalid_argument(format!(
                "document body must be an object, got {}",
                self.data.type_name()
            ))),
        }
    }

    /// Serializes the document into its persisted envelope bytes.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(encode_document(&self.id, &self.data)?)
    }

    /// Deserializes a document from its persisted envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns `Corruption` when the bytes are not a valid envelope.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let (id, data) = decode_document(bytes)?;
        Ok(Self { id, data })
    }

    /// Applies an operator-based update to the body.
    ///
    /// The update is an object whose top-level keys are operator tokens
    /// (`$set`, `$unset`, `$push`, `$pull`), each carrying an object of
    /// `path: value` entries. Paths may be dotted to descend into nested
    /// objects; numeric segments index into arrays. Operators apply in
    /// the update object's key order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unrecognized operator tokens or
    /// malformed operand shapes. Path resolution never errors: a missing
    /// intermediate segment makes that entry a no-op.
    pub fn apply_update(&mut self, update: &Value) -> CoreResult<()> {
        let Some(operators) = update.as_object() else {
            return Err(CoreError::invalid_argument(
                "update must be an object of operators",
            ));
        };

        for (op, operand) in operators {
            let Some(entries) = operand.as_object() else {
                return Err(CoreError::invalid_argument(format!(
                    "operand of {op} must be an object"
                )));
            };
            match op.as_str() {
                "$set" => {
                    for (path, value) in entries {
                        set_path(&mut self.data, path, value);
                    }
                }
                "$unset" => {
                    for path in entries.keys() {
                        unset_path(&mut self.data, path);
                    }
                }
                "$push" => {
                    for (path, value) in entries {
                        push_path(&mut self.data, path, value);
                    }
                }
                "$pull" => {
                    for (path, value) in entries {
                        pull_path(&mut self.data, path, value);
                    }
                }
                other => {
                    return Err(CoreError::invalid_argument(format!(
                        "unrecognized update operator: {other}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Descends `root` along `segments`, maps by key and arrays by numeric
/// index. Returns `None` as soon as a segment does not resolve.
fn resolve_path_mut<'a>(root: &'a mut Value, segments: &[&str]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Array(items) => {
                let index = parse_index(segment)?;
                items.get_mut(index)?
            }
            Value::Object(fields) => fields.get_mut(*segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// `$set`: a bare key always sets on the root object. A dotted path
/// descends and assigns only if the final key already exists; missing
/// intermediates or a missing final key make it a no-op.
fn set_path(root: &mut Value, path: &str, value: &Value) {
    if !path.contains('.') {
        if let Some(fields) = root.as_object_mut() {
            fields.insert(path.to_string(), value.clone());
        }
        return;
    }

    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    let Some(parent) = resolve_path_mut(root, parents) else {
        return;
    };
    match parent {
        Value::Object(fields) => {
            if let Some(slot) = fields.get_mut(*last) {
                *slot = value.clone();
            }
        }
        Value::Array(items) => {
            if let Some(slot) = parse_index(last).and_then(|index| items.get_mut(index)) {
                *slot = value.clone();
            }
        }
        _ => {}
    }
}

/// `$unset`: removes the leaf named by the path. Missing paths are
/// no-ops.
fn unset_path(root: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    let Some(parent) = resolve_path_mut(root, parents) else {
        return;
    };
    match parent {
        Value::Object(fields) => {
            fields.remove(*last);
        }
        Value::Array(items) => {
            if let Some(index) = parse_index(last) {
                if index < items.len() {
                    items.remove(index);
                }
            }
        }
        _ => {}
    }
}

/// `$push`: creates a one-element list when the path is absent, appends
/// when it is a list, and wraps `[old, new]` when it holds a scalar.
fn push_path(root: &mut Value, path: &str, value: &Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    let Some(parent) = resolve_path_mut(root, parents) else {
        return;
    };
    let Some(fields) = parent.as_object_mut() else {
        return;
    };
    match fields.get_mut(*last) {
        None => {
            fields.insert(last.to_string(), Value::Array(vec![value.clone()]));
        }
        Some(Value::Array(items)) => items.push(value.clone()),
        Some(existing) => {
            let old = existing.clone();
            *existing = Value::Array(vec![old, value.clone()]);
        }
    }
}

/// `$pull`: removes all deep-equal elements from a list. On a scalar,
/// removes the key when equal, otherwise overwrites it with the operand.
fn pull_path(root: &mut Value, path: &str, value: &Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };
    let Some(parent) = resolve_path_mut(root, parents) else {
        return;
    };
    let Some(fields) = parent.as_object_mut() else {
        return;
    };
    match fields.get_mut(*last) {
        None => {}
        Some(Value::Array(items)) => items.retain(|item| item != value),
        Some(existing) => {
            if existing == value {
                fields.remove(*last);
            } else {
                *existing = value.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: serde_json::Value) -> Document {
        Document::new("d1", Value::from(body))
    }

    fn update(document: &mut Document, update: serde_json::Value) {
        document.apply_update(&Value::from(update)).unwrap();
    }

    #[test]
    fn envelope_roundtrip_mirrors_id() {
        let mut document = doc(json!({"a": 1}));
        document.mirror_id().unwrap();
        let bytes = document.to_bytes().unwrap();
        let decoded = Document::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.id(), "d1");
        assert_eq!(decoded.data().get("_id"), Some(&Value::String("d1".into())));
    }

    #[test]
    fn set_top_level_creates() {
        let mut document = doc(json!({}));
        update(&mut document, json!({"$set": {"price": 99.0}}));
        assert_eq!(document.data().get("price"), Some(&Value::Double(99.0)));
    }

    #[test]
    fn set_is_idempotent() {
        let mut document = doc(json!({"a": 1}));
        update(&mut document, json!({"$set": {"a": 2}}));
        let once = document.clone();
        update(&mut document, json!({"$set": {"a": 2}}));
        assert_eq!(document, once);
    }

    #[test]
    fn set_dotted_existing_leaf() {
        let mut document = doc(json!({"address": {"city": "Pune", "zip": 411001}}));
        update(&mut document, json!({"$set": {"address.city": "Mumbai"}}));
        assert_eq!(
            document.data().get("address").unwrap().get("city"),
            Some(&Value::String("Mumbai".into()))
        );
    }

    #[test]
    fn set_dotted_missing_intermediate_is_noop() {
        let mut document = doc(json!({"a": 1}));
        let before = document.clone();
        update(&mut document, json!({"$set": {"b.c.d": 5}}));
        assert_eq!(document, before);
    }

    #[test]
    fn set_dotted_missing_leaf_is_noop() {
        let mut document = doc(json!({"address": {"city": "Pune"}}));
        let before = document.clone();
        update(&mut document, json!({"$set": {"address.zip": 411001}}));
        assert_eq!(document, before);
    }

    #[test]
    fn set_numeric_segment_indexes_array() {
        let mut document = doc(json!({"tags": ["a", "b", "c"]}));
        update(&mut document, json!({"$set": {"tags.1": "B"}}));
        assert_eq!(
            document.data().get("tags"),
            Some(&Value::from(json!(["a", "B", "c"])))
        );
    }

    #[test]
    fn set_numeric_segment_out_of_range_is_noop() {
        let mut document = doc(json!({"tags": ["a"]}));
        let before = document.clone();
        update(&mut document, json!({"$set": {"tags.5": "z"}}));
        assert_eq!(document, before);
    }

    #[test]
    fn unset_removes_leaf() {
        let mut document = doc(json!({"a": 1, "b": 2}));
        update(&mut document, json!({"$unset": {"a": ""}}));
        assert!(!document.data().contains_key("a"));
        assert!(document.data().contains_key("b"));
    }

    #[test]
    fn unset_is_idempotent() {
        let mut document = doc(json!({"a": 1}));
        update(&mut document, json!({"$unset": {"a": ""}}));
        let once = document.clone();
        update(&mut document, json!({"$unset": {"a": ""}}));
        assert_eq!(document, once);
    }

    #[test]
    fn unset_dotted_descends() {
        let mut document = doc(json!({"address": {"city": "Pune", "zip": 411001}}));
        update(&mut document, json!({"$unset": {"address.zip": ""}}));
        assert_eq!(
            document.data().get("address"),
            Some(&Value::from(json!({"city": "Pune"})))
        );
    }

    #[test]
    fn unset_numeric_segment_removes_element() {
        let mut document = doc(json!({"tags": ["a", "b", "c"]}));
        update(&mut document, json!({"$unset": {"tags.1": ""}}));
        assert_eq!(
            document.data().get("tags"),
            Some(&Value::from(json!(["a", "c"])))
        );
    }

    #[test]
    fn push_absent_creates_list() {
        let mut document = doc(json!({}));
        update(&mut document, json!({"$push": {"tags": "new"}}));
        assert_eq!(
            document.data().get("tags"),
            Some(&Value::from(json!(["new"])))
        );
    }

    #[test]
    fn push_appends_to_list() {
        let mut document = doc(json!({"tags": ["a"]}));
        update(&mut document, json!({"$push": {"tags": "b"}}));
        assert_eq!(
            document.data().get("tags"),
            Some(&Value::from(json!(["a", "b"])))
        );
    }

    #[test]
    fn push_wraps_scalar() {
        let mut document = doc(json!({"tag": "old"}));
        update(&mut document, json!({"$push": {"tag": "new"}}));
        assert_eq!(
            document.data().get("tag"),
            Some(&Value::from(json!(["old", "new"])))
        );
    }

    #[test]
    fn pull_removes_all_equal_elements() {
        let mut document = doc(json!({"tags": ["a", "b", "a"]}));
        update(&mut document, json!({"$pull": {"tags": "a"}}));
        assert_eq!(
            document.data().get("tags"),
            Some(&Value::from(json!(["b"])))
        );
    }

    #[test]
    fn push_then_pull_leaves_empty_list() {
        let mut document = doc(json!({}));
        update(&mut document, json!({"$push": {"tags": "new"}}));
        update(&mut document, json!({"$pull": {"tags": "new"}}));
        assert_eq!(document.data().get("tags"), Some(&Value::from(json!([]))));
    }

    #[test]
    fn pull_scalar_equal_removes_key() {
        let mut document = doc(json!({"tag": "x"}));
        update(&mut document, json!({"$pull": {"tag": "x"}}));
        assert!(!document.data().contains_key("tag"));
    }

    #[test]
    fn pull_scalar_unequal_overwrites() {
        let mut document = doc(json!({"tag": "x"}));
        update(&mut document, json!({"$pull": {"tag": "y"}}));
        assert_eq!(document.data().get("tag"), Some(&Value::String("y".into())));
    }

    #[test]
    fn pull_deep_equal_objects() {
        let mut document = doc(json!({"items": [{"k": 1}, {"k": 2}]}));
        update(&mut document, json!({"$pull": {"items": {"k": 1}}}));
        assert_eq!(
            document.data().get("items"),
            Some(&Value::from(json!([{"k": 2}])))
        );
    }

    #[test]
    fn multiple_operators_in_one_update() {
        let mut document = doc(json!({"a": 1, "b": ["x"]}));
        update(
            &mut document,
            json!({"$set": {"c": 3}, "$unset": {"a": ""}, "$push": {"b": "y"}}),
        );
        assert!(!document.data().contains_key("a"));
        assert_eq!(
            document.data().get("b"),
            Some(&Value::from(json!(["x", "y"])))
        );
        assert_eq!(document.data().get("c"), Some(&Value::Int(3)));
    }

    #[test]
    fn unknown_operator_rejected() {
        let mut document = doc(json!({}));
        let err = document
            .apply_update(&Value::from(json!({"$rename": {"a": "b"}})))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn non_object_update_rejected() {
        let mut document = doc(json!({}));
        assert!(document
            .apply_update(&Value::from(json!("not an update")))
            .is_err());
        assert!(document
            .apply_update(&Value::from(json!({"$set": 5})))
            .is_err());
    }

    #[test]
    fn non_object_body_cannot_mirror_id() {
        let mut document = Document::new("d1", Value::Int(5));
        assert!(document.mirror_id().is_err());
    }
}
