use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{Config, Result, TableId};
use crate::storage::HeapFile;
use crate::transaction::Transaction;
use crate::tuple::Schema;

/// A database instance: one catalog and one buffer pool sharing a config.
///
/// Instances are independent of each other, so several can coexist in one
/// process.
pub struct Database {
    config: Config,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
}

impl Database {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(&config, Arc::clone(&catalog));
        Self {
            config,
            catalog,
            buffer_pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Opens (or creates) the heap file at `path` and registers it as `name`.
    pub fn create_table<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        schema: Arc<Schema>,
    ) -> Result<TableId> {
        let file = HeapFile::open(path, schema, self.config.page_size)?;
        Ok(self.catalog.add_table(Arc::new(file), name))
    }

    /// Starts a new transaction.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(&self.buffer_pool)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
