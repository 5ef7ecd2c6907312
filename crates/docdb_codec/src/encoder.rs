//! MessagePack encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::collections::BTreeMap;

/// Encodes a value to MessagePack bytes.
///
/// Integers use the shortest encoding that fits; doubles are always
/// written as float64. Object keys are written in sorted order, so
/// identical values produce identical bytes.
///
/// # Errors
///
/// Returns [`CodecError::NanForbidden`] if the value contains a NaN
/// double anywhere in the tree.
pub fn to_msgpack(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = MsgpackEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A MessagePack encoder writing into an owned buffer.
pub struct MsgpackEncoder {
    buffer: Vec<u8>,
}

impl MsgpackEncoder {
    /// Creates a new encoder.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a new encoder with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encodes a value into the buffer.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => {
                self.buffer.push(0xc0);
                Ok(())
            }
            Value::Bool(b) => {
                self.buffer.push(if *b { 0xc3 } else { 0xc2 });
                Ok(())
            }
            Value::Int(n) => {
                self.encode_int(*n);
                Ok(())
            }
            Value::Double(d) => self.encode_double(*d),
            Value::String(s) => {
                self.encode_str(s);
                Ok(())
            }
            Value::Array(items) => self.encode_array(items),
            Value::Object(fields) => self.encode_object(fields),
        }
    }

    /// Consumes this encoder and returns the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Returns a reference to the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn encode_int(&mut self, n: i64) {
        if n >= 0 {
            let u = n as u64;
            if u < 0x80 {
                // positive fixint
                self.buffer.push(u as u8);
            } else if u <= u64::from(u8::MAX) {
                self.buffer.push(0xcc);
                self.buffer.push(u as u8);
            } else if u <= u64::from(u16::MAX) {
                self.buffer.push(0xcd);
                self.buffer.extend_from_slice(&(u as u16).to_be_bytes());
            } else if u <= u64::from(u32::MAX) {
                self.buffer.push(0xce);
                self.buffer.extend_from_slice(&(u as u32).to_be_bytes());
            } else {
                self.buffer.push(0xcf);
                self.buffer.extend_from_slice(&u.to_be_bytes());
            }
        } else if n >= -32 {
            // negative fixint
            self.buffer.push((n as i8) as u8);
        } else if n >= i64::from(i8::MIN) {
            self.buffer.push(0xd0);
            self.buffer.push((n as i8) as u8);
        } else if n >= i64::from(i16::MIN) {
            self.buffer.push(0xd1);
            self.buffer.extend_from_slice(&(n as i16).to_be_bytes());
        } else if n >= i64::from(i32::MIN) {
            self.buffer.push(0xd2);
            self.buffer.extend_from_slice(&(n as i32).to_be_bytes());
        } else {
            self.buffer.push(0xd3);
            self.buffer.extend_from_slice(&n.to_be_bytes());
        }
    }

    fn encode_double(&mut self, d: f64) -> CodecResult<()> {
        if d.is_nan() {
            return Err(CodecError::NanForbidden);
        }
        self.buffer.push(0xcb);
        self.buffer.extend_from_slice(&d.to_bits().to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_str(&mut self, s: &str) {
        let len = s.len();
        if len < 32 {
            // fixstr
            self.buffer.push(0xa0 | (len as u8));
        } else if len <= usize::from(u8::MAX) {
            self.buffer.push(0xd9);
            self.buffer.push(len as u8);
        } else if len <= usize::from(u16::MAX) {
            self.buffer.push(0xda);
            self.buffer.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.buffer.push(0xdb);
            self.buffer.extend_from_slice(&(len as u32).to_be_bytes());
        }
        self.buffer.extend_from_slice(s.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_array(&mut self, items: &[Value]) -> CodecResult<()> {
        let len = items.len();
        if len < 16 {
            self.buffer.push(0x90 | (len as u8));
        } else if len <= usize::from(u16::MAX) {
            self.buffer.push(0xdc);
            self.buffer.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.buffer.push(0xdd);
            self.buffer.extend_from_slice(&(len as u32).to_be_bytes());
        }
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_object(&mut self, fields: &BTreeMap<String, Value>) -> CodecResult<()> {
        let len = fields.len();
        if len < 16 {
            self.buffer.push(0x80 | (len as u8));
        } else if len <= usize::from(u16::MAX) {
            self.buffer.push(0xde);
            self.buffer.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.buffer.push(0xdf);
            self.buffer.extend_from_slice(&(len as u32).to_be_bytes());
        }
        for (key, value) in fields {
            self.encode_str(key);
            self.encode(value)?;
        }
        Ok(())
    }
}

impl Default for MsgpackEncoder {
    fn default() -> Self {
        Self::new()
    }
}
