//! MessagePack decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::collections::BTreeMap;

/// Decodes a single value from MessagePack bytes.
///
/// The entire input must be consumed; trailing bytes are an error.
///
/// # Errors
///
/// Returns an error on truncated input, invalid UTF-8 strings, unsupported
/// type families (bin, ext), non-string map keys, or unsigned integers
/// beyond the i64 range.
pub fn from_msgpack(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = MsgpackDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_at_end() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(value)
}

/// A cursor-style MessagePack decoder.
pub struct MsgpackDecoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> MsgpackDecoder<'a> {
    /// Creates a decoder over the given input.
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns true when the whole input has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.pos == self.input.len()
    }

    /// Decodes the next value from the input.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let tag = self.read_u8()?;
        match tag {
            // positive fixint
            0x00..=0x7f => Ok(Value::Int(i64::from(tag))),
            // fixmap
            0x80..=0x8f => self.decode_object(usize::from(tag & 0x0f)),
            // fixarray
            0x90..=0x9f => self.decode_array(usize::from(tag & 0x0f)),
            // fixstr
            0xa0..=0xbf => self.decode_str(usize::from(tag & 0x1f)).map(Value::String),
            0xc0 => Ok(Value::Null),
            0xc2 => Ok(Value::Bool(false)),
            0xc3 => Ok(Value::Bool(true)),
            // bin family is not part of the value model
            0xc4..=0xc6 => Err(CodecError::unsupported_type("bin")),
            0xc7..=0xc9 | 0xd4..=0xd8 => Err(CodecError::unsupported_type("ext")),
            0xca => {
                let bits = self.read_u32()?;
                Ok(Value::Double(f64::from(f32::from_bits(bits))))
            }
            0xcb => {
                let bits = self.read_u64()?;
                Ok(Value::Double(f64::from_bits(bits)))
            }
            0xcc => Ok(Value::Int(i64::from(self.read_u8()?))),
            0xcd => Ok(Value::Int(i64::from(self.read_u16()?))),
            0xce => Ok(Value::Int(i64::from(self.read_u32()?))),
            0xcf => {
                let u = self.read_u64()?;
                i64::try_from(u).map(Value::Int).map_err(|_| {
                    CodecError::decoding_failed(format!("unsigned integer {u} exceeds i64 range"))
                })
            }
            #[allow(clippy::cast_possible_wrap)]
            0xd0 => Ok(Value::Int(i64::from(self.read_u8()? as i8))),
            #[allow(clippy::cast_possible_wrap)]
            0xd1 => Ok(Value::Int(i64::from(self.read_u16()? as i16))),
            #[allow(clippy::cast_possible_wrap)]
            0xd2 => Ok(Value::Int(i64::from(self.read_u32()? as i32))),
            #[allow(clippy::cast_possible_wrap)]
            0xd3 => Ok(Value::Int(self.read_u64()? as i64)),
            0xd9 => {
                let len = usize::from(self.read_u8()?);
                self.decode_str(len).map(Value::String)
            }
            0xda => {
                let len = usize::from(self.read_u16()?);
                self.decode_str(len).map(Value::String)
            }
            0xdb => {
                let len = self.read_len_u32()?;
                self.decode_str(len).map(Value::String)
            }
            0xdc => {
                let len = usize::from(self.read_u16()?);
                self.decode_array(len)
            }
            0xdd => {
                let len = self.read_len_u32()?;
                self.decode_array(len)
            }
            0xde => {
                let len = usize::from(self.read_u16()?);
                self.decode_object(len)
            }
            0xdf => {
                let len = self.read_len_u32()?;
                self.decode_object(len)
            }
            // negative fixint
            #[allow(clippy::cast_possible_wrap)]
            0xe0..=0xff => Ok(Value::Int(i64::from(tag as i8))),
            0xc1 => Err(CodecError::decoding_failed("reserved tag 0xc1")),
        }
    }

    fn decode_str(&mut self, len: usize) -> CodecResult<String> {
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn decode_array(&mut self, len: usize) -> CodecResult<Value> {
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_object(&mut self, len: usize) -> CodecResult<Value> {
        let mut fields = BTreeMap::new();
        for _ in 0..len {
            let key = match self.decode()? {
                Value::String(s) => s,
                other => {
                    return Err(CodecError::invalid_structure(format!(
                        "map key must be a string, got {}",
                        other.type_name()
                    )))
                }
            };
            let value = self.decode()?;
            fields.insert(key, value);
        }
        Ok(Value::Object(fields))
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        let b = *self.input.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> CodecResult<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> CodecResult<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_len_u32(&mut self) -> CodecResult<usize> {
        let len = self.read_u32()?;
        usize::try_from(len).map_err(|_| CodecError::decoding_failed("length overflow"))
    }

    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(CodecError::UnexpectedEof)?;
        if end > self.input.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::to_msgpack;

    fn roundtrip(value: Value) {
        let bytes = to_msgpack(&value).unwrap();
        assert_eq!(from_msgpack(&bytes).unwrap(), value);
    }

    #[test]
    fn roundtrip_scalars() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
        roundtrip(Value::Int(0));
        roundtrip(Value::Int(-1));
        roundtrip(Value::Int(i64::MAX));
        roundtrip(Value::Int(i64::MIN));
        roundtrip(Value::Double(1299.99));
        roundtrip(Value::Double(-0.0));
        roundtrip(Value::String(String::new()));
        roundtrip(Value::String("hello world".into()));
    }

    #[test]
    fn roundtrip_nested() {
        let mut address = Value::object();
        address.insert("city", Value::String("Pune".into()));
        address.insert("zip", Value::Int(411001));

        let mut doc = Value::object();
        doc.insert("name", Value::String("Alice".into()));
        doc.insert("age", Value::Int(30));
        doc.insert("score", Value::Double(99.5));
        doc.insert(
            "tags",
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())]),
        );
        doc.insert("address", address);

        roundtrip(doc);
    }

    #[test]
    fn roundtrip_long_string() {
        roundtrip(Value::String("x".repeat(70_000)));
    }

    #[test]
    fn roundtrip_large_array() {
        roundtrip(Value::Array((0..20).map(Value::Int).collect()));
    }

    #[test]
    fn roundtrip_large_map() {
        let mut v = Value::object();
        for i in 0..20 {
            v.insert(format!("k{i}"), Value::Int(i));
        }
        roundtrip(v);
    }

    #[test]
    fn float32_widens() {
        // 0xca + f32 bits for 2.5
        let mut bytes = vec![0xca];
        bytes.extend_from_slice(&2.5f32.to_bits().to_be_bytes());
        assert_eq!(from_msgpack(&bytes).unwrap(), Value::Double(2.5));
    }

    #[test]
    fn uint64_beyond_i64_rejected() {
        let mut bytes = vec![0xcf];
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            from_msgpack(&bytes),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn truncated_input() {
        let bytes = to_msgpack(&Value::String("hello".into())).unwrap();
        assert_eq!(
            from_msgpack(&bytes[..bytes.len() - 1]),
            Err(CodecError::UnexpectedEof)
        );
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = to_msgpack(&Value::Int(1)).unwrap();
        bytes.push(0x00);
        assert_eq!(from_msgpack(&bytes), Err(CodecError::TrailingBytes));
    }

    #[test]
    fn bin_rejected() {
        assert!(matches!(
            from_msgpack(&[0xc4, 0x01, 0xff]),
            Err(CodecError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn non_string_map_key_rejected() {
        // fixmap{1}: key = int 1, value = int 2
        assert!(matches!(
            from_msgpack(&[0x81, 0x01, 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }
}
