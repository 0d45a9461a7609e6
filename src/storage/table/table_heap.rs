use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result};
use crate::storage::page::{TablePage, TablePageRef, TupleMeta};
use crate::tuple::{Schema, Tuple};

/// A table stored as a linked chain of slotted pages in the buffer pool.
///
/// Deletion is logical: tuples keep their record id forever and carry an
/// `is_deleted` flag in their metadata. Appends go to the tail page; a full
/// tail grows the chain by one page.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    first_page_id: PageId,
    /// Tail of the page chain; the mutex serializes appenders
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates an empty table heap with one fresh page.
    pub fn new(bpm: Arc<BufferPoolManager>, schema: Arc<Schema>) -> Result<Self> {
        let guard = bpm.new_page()?;
        let first_page_id = guard.page_id();
        {
            let mut guard = guard.upgrade_write();
            let mut page = TablePage::new(guard.data_mut());
            page.init(first_page_id);
        }

        Ok(Self {
            bpm,
            schema,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple with the given metadata.
    ///
    /// Returns the new record id, or None when the tuple can never fit in
    /// a page.
    pub fn insert_tuple(&self, meta: TupleMeta, tuple: &Tuple) -> Result<Option<RecordId>> {
        let Some(data) = tuple.to_bytes() else {
            return Ok(None);
        };

        let mut last_page_id = self.last_page_id.lock();

        loop {
            let page_id = *last_page_id;
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            let mut page = TablePage::new(guard.data_mut());

            if let Some(slot_id) = page.insert_tuple(meta, &data) {
                return Ok(Some(RecordId::new(page_id, slot_id)));
            }

            // Tuple larger than any empty page: give up instead of chaining
            // empty pages forever.
            if page.tuple_count() == 0 {
                return Ok(None);
            }

            // Grow the chain and retry on the fresh tail.
            let new_guard = self.bpm.new_page()?;
            let new_page_id = new_guard.page_id();
            {
                let mut new_guard = new_guard.upgrade_write();
                let mut new_page = TablePage::new(new_guard.data_mut());
                new_page.init(new_page_id);
            }
            page.set_next_page_id(Some(new_page_id));
            *last_page_id = new_page_id;
        }
    }

    /// Reads a tuple and its metadata by record id.
    pub fn get_tuple(&self, rid: RecordId) -> Result<(TupleMeta, Tuple)> {
        let guard = self.bpm.fetch_page_read(rid.page_id)?;
        let page = TablePageRef::new(guard.data());
        let (meta, data) = page.get_tuple(rid.slot_id)?;
        let tuple = Tuple::from_bytes(Arc::clone(&self.schema), data)
            .ok_or(crate::common::DbError::CorruptTuple)?;
        Ok((meta, tuple))
    }

    /// Rewrites a tuple's metadata (e.g. to mark it deleted).
    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: RecordId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(rid.page_id)?;
        let mut page = TablePage::new(guard.data_mut());
        page.update_tuple_meta(meta, rid.slot_id)
    }

    /// Snapshots every record id currently in the heap.
    ///
    /// The iterator is stable against concurrent inserts: rows appended
    /// after this call are not visited, which keeps self-modifying scans
    /// (update of the scanned table) terminating.
    pub fn make_iterator(&self) -> Result<TableIterator> {
        let mut rids = Vec::new();
        let mut next = Some(self.first_page_id);

        while let Some(page_id) = next {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let page = TablePageRef::new(guard.data());
            rids.extend(page.slot_ids().map(|slot| RecordId::new(page_id, slot)));
            next = page.next_page_id();
        }

        Ok(TableIterator { rids, pos: 0 })
    }
}

/// Iterator over a snapshot of a table heap's record ids.
pub struct TableIterator {
    rids: Vec<RecordId>,
    pos: usize,
}

impl Iterator for TableIterator {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        let rid = self.rids.get(self.pos).copied()?;
        self.pos += 1;
        Some(rid)
    }
}
