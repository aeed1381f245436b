use std::fmt;

use crate::common::DEFAULT_STRING_LEN;

/// Column types supported by the storage engine.
///
/// The set is closed: every column is either a fixed-width integer or a
/// fixed-width string, so every tuple of a table has the same byte size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit signed integer: 4 bytes, little-endian
    Integer,

    /// String of at most n bytes.
    /// Stored as: length (2 bytes) + data, zero-padded to n bytes
    Char(u16),
}

/// Bytes used by the length prefix of a `Char` column
const CHAR_LENGTH_PREFIX: usize = 2;

impl DataType {
    /// A string column of the default width.
    pub fn string() -> Self {
        DataType::Char(DEFAULT_STRING_LEN)
    }

    /// Returns the number of bytes this type occupies in a tuple slot.
    pub fn size(&self) -> usize {
        match self {
            DataType::Integer => 4,
            DataType::Char(n) => CHAR_LENGTH_PREFIX + *n as usize,
        }
    }

    /// Returns true for string columns.
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Char(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}
