use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{RecordId, Result, TxnId};
use crate::tuple::{Schema, Tuple};

use super::DiskExtendibleHashTable;

/// The contract write executors drive: keep secondary index entries in
/// step with the table heap.
pub trait Index: Send + Sync {
    /// Adds an entry mapping `key` to `rid`. False on duplicate keys.
    fn insert_entry(&self, key: &Tuple, rid: RecordId, txn: TxnId) -> Result<bool>;

    /// Drops the entry for `key`. False when no such entry exists.
    fn delete_entry(&self, key: &Tuple, rid: RecordId, txn: TxnId) -> Result<bool>;

    /// Returns the record ids stored under `key`.
    fn scan_key(&self, key: &Tuple, txn: TxnId) -> Result<Vec<RecordId>>;
}

/// A secondary index backed by the disk extendible hash table.
///
/// Key tuples are digested to a fixed-width 64-bit key: the serialized key
/// columns run through a `DefaultHasher`. Digest collisions lose entries
/// the same way truncated fixed-size index keys do in any teaching-grade
/// index; equality checks beyond the digest are out of scope.
pub struct HashIndex {
    table: DiskExtendibleHashTable<u64, RecordId>,
    key_schema: Arc<Schema>,
    key_attrs: Vec<usize>,
}

impl HashIndex {
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        key_schema: Arc<Schema>,
        key_attrs: Vec<usize>,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: u32,
    ) -> Result<Self> {
        let table =
            DiskExtendibleHashTable::new(bpm, header_max_depth, directory_max_depth, bucket_max_size)?;
        Ok(Self {
            table,
            key_schema,
            key_attrs,
        })
    }

    pub fn key_schema(&self) -> &Arc<Schema> {
        &self.key_schema
    }

    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    /// Extracts this index's key tuple from a full table row.
    pub fn key_from_tuple(&self, tuple: &Tuple) -> Option<Tuple> {
        tuple.key_from_tuple(Arc::clone(&self.key_schema), &self.key_attrs)
    }

    /// Digests a key tuple (already in key schema shape) to the fixed
    /// 64-bit key the hash table stores.
    fn digest(&self, key: &Tuple) -> Option<u64> {
        let all_columns: Vec<usize> = (0..key.len()).collect();
        let bytes = key.key_bytes(&all_columns)?;
        let mut hasher = DefaultHasher::new();
        hasher.write(&bytes);
        Some(hasher.finish())
    }
}

impl Index for HashIndex {
    fn insert_entry(&self, key: &Tuple, rid: RecordId, _txn: TxnId) -> Result<bool> {
        match self.digest(key) {
            Some(digest) => self.table.insert(&digest, &rid),
            None => Ok(false),
        }
    }

    fn delete_entry(&self, key: &Tuple, _rid: RecordId, _txn: TxnId) -> Result<bool> {
        match self.digest(key) {
            Some(digest) => self.table.remove(&digest),
            None => Ok(false),
        }
    }

    fn scan_key(&self, key: &Tuple, _txn: TxnId) -> Result<Vec<RecordId>> {
        match self.digest(key) {
            Some(digest) => self.table.get(&digest),
            None => Ok(Vec::new()),
        }
    }
}
