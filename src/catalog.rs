use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::common::{DbError, Result, TableId};
use crate::storage::HeapFile;
use crate::tuple::Schema;

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
}

#[derive(Default)]
struct CatalogState {
    tables: HashMap<TableId, TableEntry>,
    names: HashMap<String, TableId>,
}

/// Maps table ids and names to their heap files and schemas.
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`. A table already registered under the
    /// same name, or with the same id, is replaced.
    pub fn add_table(&self, file: Arc<HeapFile>, name: impl Into<String>) -> TableId {
        let name = name.into();
        let id = file.id();
        let mut state = self.state.write();

        if let Some(old_id) = state.names.remove(&name) {
            state.tables.remove(&old_id);
        }
        if let Some(old) = state.tables.remove(&id) {
            state.names.remove(&old.name);
        }

        info!(table = %id, %name, schema = %file.schema(), "registered table");
        state.names.insert(name.clone(), id);
        state.tables.insert(id, TableEntry { file, name });
        id
    }

    pub fn database_file(&self, id: TableId) -> Result<Arc<HeapFile>> {
        self.state
            .read()
            .tables
            .get(&id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(DbError::TableNotFound(id))
    }

    /// Returns the schema of table `id`.
    pub fn tuple_desc(&self, id: TableId) -> Result<Arc<Schema>> {
        self.database_file(id).map(|file| Arc::clone(file.schema()))
    }

    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.state
            .read()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| DbError::TableNameNotFound(name.to_string()))
    }

    pub fn table_name(&self, id: TableId) -> Result<String> {
        self.state
            .read()
            .tables
            .get(&id)
            .map(|entry| entry.name.clone())
            .ok_or(DbError::TableNotFound(id))
    }

    /// Ids of every registered table, in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.state.read().tables.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.tables.clear();
        state.names.clear();
    }
}
