use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::common::{DbError, RecordId, Result};

use super::{Schema, Value};

/// Represents a single row of a table.
///
/// A tuple holds one value per schema column and, once stored, the
/// `RecordId` of the heap page slot it lives in.
///
/// ## Tuple Binary Format
///
/// Columns are written back to back in schema order, each using exactly
/// `DataType::size()` bytes, so every tuple of a schema has the same length:
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | column 0  | column 1  | ... | column n  |
/// +-----------+-----------+-----+-----------+
/// ```
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema defining the structure of this tuple
    schema: Arc<Schema>,

    /// The values for each column (in schema order)
    values: Vec<Value>,

    /// Storage location, set on insert
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a new tuple with the given schema and values.
    ///
    /// Fails with `SchemaMismatch` if the number or kinds of the values do
    /// not match the schema.
    pub fn new(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.column_count()
            || !values
                .iter()
                .zip(schema.columns())
                .all(|(v, c)| v.matches(c.data_type()))
        {
            return Err(DbError::SchemaMismatch);
        }
        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Reads a tuple laid out by `serialize` from `buf`.
    /// Returns None if the data is too short or malformed.
    pub fn deserialize<B: Buf>(schema: Arc<Schema>, buf: &mut B) -> Option<Self> {
        let values = schema
            .columns()
            .map(|col| Value::deserialize(col.data_type(), buf))
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            schema,
            values,
            record_id: None,
        })
    }

    /// Writes the tuple in its fixed-width binary format.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        for (value, col) in self.values.iter().zip(self.schema.columns()) {
            value.serialize(col.data_type(), buf)?;
        }
        Ok(())
    }

    /// Serializes the tuple into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.schema.tuple_size());
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the value at the given column index.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value for the given column name.
    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.schema
            .column_index(name)
            .and_then(|i| self.values.get(i))
    }

    /// Returns all values in this tuple.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Replaces the value at the given column index.
    pub fn set_value(&mut self, index: usize, value: Value) -> Result<()> {
        match self.schema.data_type(index) {
            Some(data_type) if value.matches(data_type) => {
                self.values[index] = value;
                Ok(())
            }
            _ => Err(DbError::SchemaMismatch),
        }
    }

    /// Returns where this tuple is stored, if it has been inserted.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Returns the number of columns/values in this tuple.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Tuples compare by schema and values; the storage location is ignored.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl Eq for Tuple {}

/// Tab-separated field values.
impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

/// Builder for constructing tuples fluently.
pub struct TupleBuilder {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TupleBuilder {
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.column_count();
        Self {
            schema,
            values: Vec::with_capacity(count),
        }
    }

    /// Appends the value for the next column.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn build(self) -> Result<Tuple> {
        Tuple::new(self.schema, self.values)
    }
}
