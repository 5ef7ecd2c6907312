//! Order-preserving index key codec.
//!
//! Secondary index keys are `encode(value) || "#" || doc_id`. The value
//! portion must sort bytewise in the natural order of the source type:
//!
//! - integers: sign-bit-biased, 8 bytes big-endian
//! - doubles: IEEE-754 bits, all bits flipped for negatives, sign bit
//!   flipped for positives, 8 bytes big-endian
//! - strings: raw UTF-8 bytes
//! - booleans: the ASCII literals `true` / `false`
//!
//! Null and nested values are not indexable. Numeric encodings are fixed
//! width, so scans always consume all 8 value bytes before the separator;
//! strings containing `#` are stored as-is.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// The byte separating the encoded value from the document id in index
/// keys.
pub const INDEX_KEY_SEPARATOR: u8 = b'#';

const SIGN_BIT: u64 = 1 << 63;

/// Encodes a scalar value into its order-preserving index key bytes.
///
/// Returns `Ok(None)` for values that are not indexable (null, arrays,
/// objects); index maintenance skips those fields.
///
/// # Errors
///
/// Returns [`CodecError::NanForbidden`] for NaN doubles, whose ordering
/// the codec does not define.
pub fn index_key(value: &Value) -> CodecResult<Option<Vec<u8>>> {
    match value {
        Value::Int(n) => Ok(Some(encode_int(*n).to_vec())),
        Value::Double(d) => {
            if d.is_nan() {
                return Err(CodecError::NanForbidden);
            }
            Ok(Some(encode_double(*d).to_vec()))
        }
        Value::String(s) => Ok(Some(s.as_bytes().to_vec())),
        Value::Bool(b) => Ok(Some(
            if *b { &b"true"[..] } else { &b"false"[..] }.to_vec(),
        )),
        Value::Null | Value::Array(_) | Value::Object(_) => Ok(None),
    }
}

#[allow(clippy::cast_sign_loss)]
fn encode_int(n: i64) -> [u8; 8] {
    // Biasing by 2^63 maps i64::MIN..=i64::MAX onto 0..=u64::MAX, which
    // is exactly an XOR of the sign bit.
    ((n as u64) ^ SIGN_BIT).to_be_bytes()
}

fn encode_double(d: f64) -> [u8; 8] {
    let bits = d.to_bits();
    let folded = if bits & SIGN_BIT != 0 {
        // Negative: flipping every bit reverses the order of the
        // magnitude and places all negatives below all positives.
        !bits
    } else {
        bits | SIGN_BIT
    };
    folded.to_be_bytes()
}

/// Decodes an 8-byte integer index key. Provided for tests and tooling.
///
/// # Errors
///
/// Returns an error if `encoded` is not exactly 8 bytes.
pub fn decode_int_key(encoded: &[u8]) -> CodecResult<i64> {
    let bytes = fixed8(encoded)?;
    #[allow(clippy::cast_possible_wrap)]
    Ok((u64::from_be_bytes(bytes) ^ SIGN_BIT) as i64)
}

/// Decodes an 8-byte double index key. Provided for tests and tooling.
///
/// # Errors
///
/// Returns an error if `encoded` is not exactly 8 bytes.
pub fn decode_double_key(encoded: &[u8]) -> CodecResult<f64> {
    let bytes = fixed8(encoded)?;
    let folded = u64::from_be_bytes(bytes);
    let bits = if folded & SIGN_BIT != 0 {
        folded & !SIGN_BIT
    } else {
        !folded
    };
    Ok(f64::from_bits(bits))
}

fn fixed8(encoded: &[u8]) -> CodecResult<[u8; 8]> {
    <[u8; 8]>::try_from(encoded).map_err(|_| {
        CodecError::invalid_structure(format!(
            "numeric index key must be 8 bytes, got {}",
            encoded.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key_of(value: &Value) -> Vec<u8> {
        index_key(value).unwrap().unwrap()
    }

    #[test]
    fn int_order_across_sign() {
        let cases = [i64::MIN, -1_000_000, -1, 0, 1, 42, 1_000_000, i64::MAX];
        for pair in cases.windows(2) {
            assert!(
                key_of(&Value::Int(pair[0])) < key_of(&Value::Int(pair[1])),
                "expected encode({}) < encode({})",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn double_order_across_sign() {
        let cases = [
            f64::NEG_INFINITY,
            -1.0e300,
            -1299.99,
            -1.0,
            -f64::MIN_POSITIVE,
            0.0,
            f64::MIN_POSITIVE,
            49.99,
            1299.99,
            1.0e300,
            f64::INFINITY,
        ];
        for pair in cases.windows(2) {
            assert!(
                key_of(&Value::Double(pair[0])) < key_of(&Value::Double(pair[1])),
                "expected encode({}) < encode({})",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn zero_signs_are_adjacent() {
        // -0.0 sorts immediately below +0.0; both decode back exactly.
        assert!(key_of(&Value::Double(-0.0)) < key_of(&Value::Double(0.0)));
        assert!(decode_double_key(&key_of(&Value::Double(-0.0)))
            .unwrap()
            .is_sign_negative());
    }

    #[test]
    fn numeric_keys_are_fixed_width() {
        for n in [i64::MIN, -35, 0, 35, i64::MAX] {
            assert_eq!(key_of(&Value::Int(n)).len(), 8);
        }
        for d in [-1.5, 0.0, 99.0, 1299.99] {
            assert_eq!(key_of(&Value::Double(d)).len(), 8);
        }
    }

    #[test]
    fn string_keys_are_raw_bytes() {
        assert_eq!(key_of(&Value::String("abc".into())), b"abc".to_vec());
    }

    #[test]
    fn bool_keys_are_literals() {
        assert_eq!(key_of(&Value::Bool(true)), b"true".to_vec());
        assert_eq!(key_of(&Value::Bool(false)), b"false".to_vec());
    }

    #[test]
    fn non_scalars_are_not_indexable() {
        assert_eq!(index_key(&Value::Null).unwrap(), None);
        assert_eq!(index_key(&Value::Array(vec![])).unwrap(), None);
        assert_eq!(index_key(&Value::object()).unwrap(), None);
    }

    #[test]
    fn nan_rejected() {
        assert_eq!(
            index_key(&Value::Double(f64::NAN)),
            Err(CodecError::NanForbidden)
        );
    }

    #[test]
    fn int_roundtrip() {
        for n in [i64::MIN, -1, 0, 7, i64::MAX] {
            assert_eq!(decode_int_key(&key_of(&Value::Int(n))).unwrap(), n);
        }
    }

    #[test]
    fn decode_wrong_width() {
        assert!(decode_int_key(b"short").is_err());
        assert!(decode_double_key(&[0u8; 9]).is_err());
    }

    proptest! {
        #[test]
        fn int_monotonic(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a < b);
            prop_assert!(key_of(&Value::Int(a)) < key_of(&Value::Int(b)));
        }

        #[test]
        fn double_monotonic(a in any::<f64>(), b in any::<f64>()) {
            prop_assume!(!a.is_nan() && !b.is_nan());
            prop_assume!(a < b);
            prop_assert!(key_of(&Value::Double(a)) < key_of(&Value::Double(b)));
        }

        #[test]
        fn double_roundtrip(d in any::<f64>()) {
            prop_assume!(!d.is_nan());
            let decoded = decode_double_key(&key_of(&Value::Double(d))).unwrap();
            prop_assert_eq!(decoded.to_bits(), d.to_bits());
        }
    }
}
