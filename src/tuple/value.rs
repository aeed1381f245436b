use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::{DbError, Result};

use super::DataType;

/// Represents a typed value stored in a tuple field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// 32-bit signed integer
    Integer(i32),

    /// String value, stored in a `Char` column
    String(String),
}

impl Value {
    /// Returns the type of this value. Strings report their own byte length.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::String(s) => DataType::Char(s.len().min(u16::MAX as usize) as u16),
        }
    }

    /// Returns true if this value can be stored in a column of the given type.
    pub fn matches(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Integer(_), DataType::Integer) | (Value::String(_), DataType::Char(_))
        )
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    /// Writes this value into `buf` using exactly `data_type.size()` bytes.
    /// Strings longer than the column width are truncated on a char boundary.
    pub fn serialize<B: BufMut>(&self, data_type: &DataType, buf: &mut B) -> Result<()> {
        match (self, data_type) {
            (Value::Integer(v), DataType::Integer) => {
                buf.put_i32_le(*v);
                Ok(())
            }

            (Value::String(s), DataType::Char(n)) => {
                let width = *n as usize;
                let mut end = s.len().min(width);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                buf.put_u16_le(end as u16);
                buf.put_slice(&s.as_bytes()[..end]);
                buf.put_bytes(0, width - end);
                Ok(())
            }

            _ => Err(DbError::TypeMismatch {
                value: self.to_string(),
                data_type: data_type.to_string(),
            }),
        }
    }

    /// Reads a value of the given type from `buf`, consuming `data_type.size()` bytes.
    /// Returns None if the buffer is too short or the stored length is invalid.
    pub fn deserialize<B: Buf>(data_type: &DataType, buf: &mut B) -> Option<Self> {
        if buf.remaining() < data_type.size() {
            return None;
        }

        match data_type {
            DataType::Integer => Some(Value::Integer(buf.get_i32_le())),

            DataType::Char(n) => {
                let width = *n as usize;
                let len = buf.get_u16_le() as usize;
                if len > width {
                    return None;
                }
                let mut raw = vec![0u8; width];
                buf.copy_to_slice(&mut raw);
                raw.truncate(len);
                String::from_utf8(raw).ok().map(Value::String)
            }
        }
    }

    /// Compares two values for ordering.
    /// Returns None if the values are of different kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
