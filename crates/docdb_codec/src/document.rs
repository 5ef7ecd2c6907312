//! Persisted document envelope.
//!
//! Documents are stored as `msgpack({id: <string>, data: <body>})`.

use crate::decoder::from_msgpack;
use crate::encoder::to_msgpack;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encodes a document envelope to its persisted bytes.
///
/// # Errors
///
/// Returns an error if the body cannot be encoded (NaN doubles).
pub fn encode_document(id: &str, data: &Value) -> CodecResult<Vec<u8>> {
    let mut envelope = Value::object();
    envelope.insert("id", Value::String(id.to_string()));
    envelope.insert("data", data.clone());
    to_msgpack(&envelope)
}

/// Decodes a persisted envelope into `(id, body)`.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid envelope: not
/// MessagePack, not an object, or missing/ill-typed `id`/`data` fields.
pub fn decode_document(bytes: &[u8]) -> CodecResult<(String, Value)> {
    let envelope = from_msgpack(bytes)?;
    let Value::Object(mut fields) = envelope else {
        return Err(CodecError::invalid_structure(
            "document envelope must be an object",
        ));
    };
    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(other) => {
            return Err(CodecError::invalid_structure(format!(
                "envelope id must be a string, got {}",
                other.type_name()
            )))
        }
        None => return Err(CodecError::invalid_structure("envelope missing id")),
    };
    let data = fields
        .remove("data")
        .ok_or_else(|| CodecError::invalid_structure("envelope missing data"))?;
    Ok((id, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let mut body = Value::object();
        body.insert("price", Value::Double(1299.99));
        body.insert("category", Value::String("Electronics".into()));

        let bytes = encode_document("p1", &body).unwrap();
        let (id, data) = decode_document(&bytes).unwrap();
        assert_eq!(id, "p1");
        assert_eq!(data, body);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_document(b"\xc1not an envelope").is_err());
    }

    #[test]
    fn non_object_envelope_rejected() {
        let bytes = to_msgpack(&Value::Int(1)).unwrap();
        assert!(decode_document(&bytes).is_err());
    }

    #[test]
    fn missing_fields_rejected() {
        let mut envelope = Value::object();
        envelope.insert("id", Value::String("x".into()));
        let bytes = to_msgpack(&envelope).unwrap();
        assert!(decode_document(&bytes).is_err());

        let mut envelope = Value::object();
        envelope.insert("data", Value::object());
        let bytes = to_msgpack(&envelope).unwrap();
        assert!(decode_document(&bytes).is_err());
    }

    #[test]
    fn ill_typed_id_rejected() {
        let mut envelope = Value::object();
        envelope.insert("id", Value::Int(7));
        envelope.insert("data", Value::object());
        let bytes = to_msgpack(&envelope).unwrap();
        assert!(decode_document(&bytes).is_err());
    }
}
