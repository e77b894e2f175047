use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// The closed set of value kinds the bus can carry, each with a unique
/// single-byte wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Str,
    Double,
    DoubleArray,
    StringArray,
    ByteArray,
    Boolean,
    BooleanArray,
    Int,
    LongArray,
    None,
}

impl ValueKind {
    pub const fn tag(self) -> u8 {
        match self {
            ValueKind::Str => b's',
            ValueKind::Double => b'd',
            ValueKind::DoubleArray => b'D',
            ValueKind::StringArray => b'S',
            ValueKind::ByteArray => b'B',
            ValueKind::Boolean => b'b',
            ValueKind::BooleanArray => b'A',
            ValueKind::Int => b'i',
            ValueKind::LongArray => b'L',
            ValueKind::None => b'n',
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            b's' => Ok(ValueKind::Str),
            b'd' => Ok(ValueKind::Double),
            b'D' => Ok(ValueKind::DoubleArray),
            b'S' => Ok(ValueKind::StringArray),
            b'B' => Ok(ValueKind::ByteArray),
            b'b' => Ok(ValueKind::Boolean),
            b'A' => Ok(ValueKind::BooleanArray),
            b'i' => Ok(ValueKind::Int),
            b'L' => Ok(ValueKind::LongArray),
            b'n' => Ok(ValueKind::None),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

/// A typed telemetry value.
///
/// Equality is used for change detection on the capture path: a channel
/// whose value compares equal to its previous sample produces no data frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Double(f64),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    ByteArray(#[serde(with = "serde_bytes")] Vec<u8>),
    Boolean(bool),
    BooleanArray(Vec<bool>),
    Int(i32),
    LongArray(Vec<i64>),
    None,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Double(_) => ValueKind::Double,
            Value::DoubleArray(_) => ValueKind::DoubleArray,
            Value::StringArray(_) => ValueKind::StringArray,
            Value::ByteArray(_) => ValueKind::ByteArray,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::BooleanArray(_) => ValueKind::BooleanArray,
            Value::Int(_) => ValueKind::Int,
            Value::LongArray(_) => ValueKind::LongArray,
            Value::None => ValueKind::None,
        }
    }

    /// Appends the positional wire encoding of this value.
    ///
    /// Scalars are fixed-width big-endian; strings and byte arrays carry a
    /// u32 length prefix; other arrays carry a u32 element count followed by
    /// the per-element encodings.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Value::Str(s) => encode_str(s, out),
            Value::Double(d) => out.extend_from_slice(&d.to_bits().to_be_bytes()),
            Value::DoubleArray(values) => {
                out.extend_from_slice(&(values.len() as u32).to_be_bytes());
                for value in values {
                    out.extend_from_slice(&value.to_bits().to_be_bytes());
                }
            }
            Value::StringArray(values) => {
                out.extend_from_slice(&(values.len() as u32).to_be_bytes());
                for value in values {
                    encode_str(value, out);
                }
            }
            Value::ByteArray(bytes) => {
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Value::Boolean(b) => out.push(u8::from(*b)),
            Value::BooleanArray(values) => {
                out.extend_from_slice(&(values.len() as u32).to_be_bytes());
                for value in values {
                    out.push(u8::from(*value));
                }
            }
            Value::Int(i) => out.extend_from_slice(&i.to_be_bytes()),
            Value::LongArray(values) => {
                out.extend_from_slice(&(values.len() as u32).to_be_bytes());
                for value in values {
                    out.extend_from_slice(&value.to_be_bytes());
                }
            }
            Value::None => {}
        }
    }

    /// Decodes exactly one payload of the given kind, advancing `input`
    /// past the consumed bytes.
    pub fn decode_payload(kind: ValueKind, input: &mut &[u8]) -> Result<Value, CodecError> {
        let value = match kind {
            ValueKind::Str => Value::Str(decode_str(input)?),
            ValueKind::Double => Value::Double(f64::from_bits(u64::from_be_bytes(
                take_array::<8>(input)?,
            ))),
            ValueKind::DoubleArray => {
                let count = decode_count(input)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(f64::from_bits(u64::from_be_bytes(take_array::<8>(input)?)));
                }
                Value::DoubleArray(values)
            }
            ValueKind::StringArray => {
                let count = decode_count(input)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(decode_str(input)?);
                }
                Value::StringArray(values)
            }
            ValueKind::ByteArray => {
                let len = decode_count(input)?;
                Value::ByteArray(take(input, len)?.to_vec())
            }
            ValueKind::Boolean => Value::Boolean(decode_bool(input)?),
            ValueKind::BooleanArray => {
                let count = decode_count(input)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(decode_bool(input)?);
                }
                Value::BooleanArray(values)
            }
            ValueKind::Int => Value::Int(i32::from_be_bytes(take_array::<4>(input)?)),
            ValueKind::LongArray => {
                let count = decode_count(input)?;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(i64::from_be_bytes(take_array::<8>(input)?));
                }
                Value::LongArray(values)
            }
            ValueKind::None => Value::None,
        };

        Ok(value)
    }
}

pub(crate) fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::ShortFrame);
    }

    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}

pub(crate) fn take_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N], CodecError> {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(take(input, N)?);
    Ok(bytes)
}

fn decode_count(input: &mut &[u8]) -> Result<usize, CodecError> {
    Ok(u32::from_be_bytes(take_array::<4>(input)?) as usize)
}

fn decode_bool(input: &mut &[u8]) -> Result<bool, CodecError> {
    match take_array::<1>(input)?[0] {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::InvalidBoolean(other)),
    }
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn decode_str(input: &mut &[u8]) -> Result<String, CodecError> {
    let len = decode_count(input)?;
    let bytes = take(input, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}
