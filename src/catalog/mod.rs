use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::BufferPoolManager;
use crate::common::{DbError, Oid, Result, HTABLE_DIRECTORY_MAX_DEPTH};
use crate::index::HashIndex;
use crate::storage::table::TableHeap;
use crate::tuple::Schema;

/// Everything the execution layer needs to know about a table.
pub struct TableInfo {
    pub oid: Oid,
    pub name: String,
    pub schema: Arc<Schema>,
    pub heap: Arc<TableHeap>,
}

/// Everything the execution layer needs to know about an index.
pub struct IndexInfo {
    pub oid: Oid,
    pub name: String,
    pub table_name: String,
    /// Schema of the key tuples this index stores
    pub key_schema: Arc<Schema>,
    /// Which table columns make up the key, in key order
    pub key_attrs: Vec<usize>,
    pub index: Arc<HashIndex>,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<Oid, Arc<TableInfo>>,
    table_names: HashMap<String, Oid>,
    indexes: HashMap<Oid, Arc<IndexInfo>>,
    /// table name -> index name -> index oid
    index_names: HashMap<String, HashMap<String, Oid>>,
    next_table_oid: Oid,
    next_index_oid: Oid,
}

/// In-memory registry of tables and indexes.
///
/// Persisting the catalog is out of scope; tables live for the process.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    /// Creates a table and its backing heap.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<TableInfo>> {
        let mut inner = self.inner.write();
        if inner.table_names.contains_key(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }

        let schema = Arc::new(schema);
        let heap = Arc::new(TableHeap::new(Arc::clone(&self.bpm), Arc::clone(&schema))?);

        let oid = inner.next_table_oid;
        inner.next_table_oid += 1;

        let info = Arc::new(TableInfo {
            oid,
            name: name.to_string(),
            schema,
            heap,
        });
        inner.tables.insert(oid, Arc::clone(&info));
        inner.table_names.insert(name.to_string(), oid);

        Ok(info)
    }

    pub fn table(&self, oid: Oid) -> Option<Arc<TableInfo>> {
        self.inner.read().tables.get(&oid).cloned()
    }

    pub fn table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let inner = self.inner.read();
        let oid = inner.table_names.get(name)?;
        inner.tables.get(oid).cloned()
    }

    /// Creates a hash index over `key_attrs` of an existing table.
    pub fn create_index(
        &self,
        index_name: &str,
        table_name: &str,
        key_attrs: Vec<usize>,
    ) -> Result<Arc<IndexInfo>> {
        let table = self
            .table_by_name(table_name)
            .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))?;
        let key_schema = Arc::new(
            table
                .schema
                .project(&key_attrs)
                .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))?,
        );

        let index = Arc::new(HashIndex::new(
            Arc::clone(&self.bpm),
            Arc::clone(&key_schema),
            key_attrs.clone(),
            0,
            HTABLE_DIRECTORY_MAX_DEPTH,
            0,
        )?);

        let mut inner = self.inner.write();
        let oid = inner.next_index_oid;
        inner.next_index_oid += 1;

        let info = Arc::new(IndexInfo {
            oid,
            name: index_name.to_string(),
            table_name: table_name.to_string(),
            key_schema,
            key_attrs,
            index,
        });
        inner.indexes.insert(oid, Arc::clone(&info));
        inner
            .index_names
            .entry(table_name.to_string())
            .or_default()
            .insert(index_name.to_string(), oid);

        Ok(info)
    }

    pub fn index(&self, oid: Oid) -> Option<Arc<IndexInfo>> {
        self.inner.read().indexes.get(&oid).cloned()
    }

    /// Lists every index on a table.
    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        let inner = self.inner.read();
        inner
            .index_names
            .get(table_name)
            .map(|by_name| {
                by_name
                    .values()
                    .filter_map(|oid| inner.indexes.get(oid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
