use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::DataType;

/// A single column of a table schema. Columns may be anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, if any
    name: Option<String>,

    /// Column data type
    data_type: DataType,
}

impl Column {
    pub fn new(name: Option<String>, data_type: DataType) -> Self {
        Self { name, data_type }
    }

    pub fn named(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(Some(name.into()), data_type)
    }

    pub fn unnamed(data_type: DataType) -> Self {
        Self::new(None, data_type)
    }

    /// Returns the column name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Returns the number of bytes this column occupies in a tuple slot.
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", name, self.data_type),
            None => write!(f, "null({})", self.data_type),
        }
    }
}

/// Describes the layout of every tuple in a table: an ordered list of typed,
/// optionally named columns with a fixed total byte size.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,

    /// Map from column name to the first column index with that name
    name_to_index: HashMap<String, usize>,

    /// Total size of one serialized tuple
    tuple_size: usize,
}

impl Schema {
    /// Creates a new schema from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::new();
        for (i, col) in columns.iter().enumerate() {
            if let Some(name) = col.name() {
                name_to_index.entry(name.to_string()).or_insert(i);
            }
        }
        let tuple_size = columns.iter().map(Column::size).sum();

        Self {
            columns,
            name_to_index,
            tuple_size,
        }
    }

    /// Creates a schema with anonymous columns of the given types.
    pub fn from_types(types: &[DataType]) -> Self {
        Self::new(types.iter().copied().map(Column::unnamed).collect())
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Concatenates two schemas, `a`'s columns first.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let mut columns = a.columns.clone();
        columns.extend(b.columns.iter().cloned());
        Schema::new(columns)
    }

    /// Returns the number of columns in the schema.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the type of the column at the given index.
    pub fn data_type(&self, index: usize) -> Option<&DataType> {
        self.columns.get(index).map(Column::data_type)
    }

    /// Returns the index of the first column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the size in bytes of one serialized tuple.
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }
}

/// Schemas are equal when their column types match position by position;
/// column names do not participate.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        Ok(())
    }
}

/// Builder for constructing schemas fluently.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a named column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::named(name, data_type));
        self
    }

    /// Adds an anonymous column.
    pub fn unnamed_column(mut self, data_type: DataType) -> Self {
        self.columns.push(Column::unnamed(data_type));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
