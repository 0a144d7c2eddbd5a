//! Field-level binary codec for manifest records.
//!
//! A record is a flat sequence of [Value]s described by a static table of
//! [FieldFormat]s. Integers are fixed-width big-endian; strings carry a
//! 4-byte big-endian length prefix.

use crate::error::{IndexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    U8,
    U16,
    U32,
    U64,
    I64,
    Str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    Str(String),
}

impl FieldFormat {
    /// Width of fixed-size formats, `None` for `Str`.
    #[inline]
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldFormat::U8 => Some(1),
            FieldFormat::U16 => Some(2),
            FieldFormat::U32 => Some(4),
            FieldFormat::U64 | FieldFormat::I64 => Some(8),
            FieldFormat::Str => None,
        }
    }
}

impl Value {
    pub fn format(&self) -> FieldFormat {
        match self {
            Value::U8(_) => FieldFormat::U8,
            Value::U16(_) => FieldFormat::U16,
            Value::U32(_) => FieldFormat::U32,
            Value::U64(_) => FieldFormat::U64,
            Value::I64(_) => FieldFormat::I64,
            Value::Str(_) => FieldFormat::Str,
        }
    }
}

/// A type that can be stored as one manifest record.
pub trait Record: Sized {
    /// Static codec table, one entry per encoded field.
    fn formats() -> &'static [FieldFormat];

    /// Field values in `formats()` order.
    fn values(&self) -> Vec<Value>;

    fn from_values(values: Vec<Value>) -> Result<Self>;
}

pub fn encode(values: &[Value], formats: &[FieldFormat]) -> Result<Vec<u8>> {
    if values.len() != formats.len() {
        return Err(IndexError::format(format!(
            "{} values for {} formats",
            values.len(),
            formats.len()
        )));
    }

    let mut buf = Vec::with_capacity(encoded_len_hint(values));
    for (i, (value, format)) in values.iter().zip(formats).enumerate() {
        if value.format() != *format {
            return Err(IndexError::format(format!(
                "field {i}: value is {:?}, format is {:?}",
                value.format(),
                format
            )));
        }

        match value {
            Value::U8(v) => buf.push(*v),
            Value::U16(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::U32(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::U64(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::I64(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Str(s) => {
                let len: u32 = s.len().try_into().map_err(|_| {
                    IndexError::format(format!("field {i}: string of {} bytes too long", s.len()))
                })?;
                buf.extend_from_slice(&len.to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
        }
    }

    Ok(buf)
}

fn encoded_len_hint(values: &[Value]) -> usize {
    values
        .iter()
        .map(|v| match v {
            Value::Str(s) => 4 + s.len(),
            other => other.format().fixed_width().unwrap_or(0),
        })
        .sum()
}

/// Decode exactly `bytes` into values. Short input and trailing bytes are
/// both corruption.
pub fn decode(bytes: &[u8], formats: &[FieldFormat]) -> Result<Vec<Value>> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let mut values = Vec::with_capacity(formats.len());

    for format in formats {
        let value = match format {
            FieldFormat::U8 => Value::U8(cursor.take::<1>()?[0]),
            FieldFormat::U16 => Value::U16(u16::from_be_bytes(cursor.take()?)),
            FieldFormat::U32 => Value::U32(u32::from_be_bytes(cursor.take()?)),
            FieldFormat::U64 => Value::U64(u64::from_be_bytes(cursor.take()?)),
            FieldFormat::I64 => Value::I64(i64::from_be_bytes(cursor.take()?)),
            FieldFormat::Str => {
                let len = u32::from_be_bytes(cursor.take()?) as usize;
                let raw = cursor.take_slice(len)?;
                let s = std::str::from_utf8(raw)
                    .map_err(|e| IndexError::corrupt(format!("string field is not UTF-8: {e}")))?;
                Value::Str(s.to_owned())
            }
        };
        values.push(value);
    }

    if cursor.pos != bytes.len() {
        return Err(IndexError::corrupt(format!(
            "{} trailing bytes after record",
            bytes.len() - cursor.pos
        )));
    }

    Ok(values)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                IndexError::corrupt(format!(
                    "record truncated: need {n} bytes at offset {}",
                    self.pos
                ))
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take_slice(N)?);
        Ok(out)
    }
}

#[cfg(test)]
#[path = "binary_tests.rs"]
mod tests;
