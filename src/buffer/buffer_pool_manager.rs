use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{DbError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Mapping state guarded by the pool-wide latch.
struct PoolCore {
    /// Page table: maps page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that have never held a page (or were deleted back into reuse)
    free_list: LinkedList<FrameId>,
}

/// State shared with guard release callbacks.
struct BufferPoolState {
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// The pool-wide latch. Every public operation holds it end-to-end, so
    /// no operation ever observes a half-installed page-to-frame mapping.
    latch: Mutex<PoolCore>,
}

impl BufferPoolState {
    /// Gives a pin back. Returns false when the page is unmapped or was not
    /// pinned; otherwise ORs the dirty flag, decrements the pin and marks
    /// the frame evictable once the count reaches zero.
    fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let core = self.latch.lock();
        let Some(&frame_id) = core.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        let Some(remaining) = frame.unpin() else {
            return false;
        };
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }
}

/// BufferPoolManager caches disk pages in a fixed set of in-memory frames.
///
/// Pages are handed out exclusively through RAII guards: a guard pins its
/// frame (blocking eviction) for as long as it lives, and read/write guards
/// additionally hold the page latch. Eviction follows the embedded LRU-K
/// replacer; dirty victims are written back through the disk scheduler
/// before their frame is reused.
///
/// One pool-wide mutex serializes every operation, and disk I/O issued
/// under it is awaited before the mutex is released - the miss, frame
/// claim, read and page-table install of a fetch are one atomic step.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    state: Arc<BufferPoolState>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value
    /// for LRU-K, and disk manager.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            replacer: LruKReplacer::new(k, pool_size),
            latch: Mutex::new(PoolCore {
                page_table: HashMap::new(),
                free_list,
            }),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and returns a guard pinning it.
    ///
    /// The new page starts with pin count 1 and is not evictable until the
    /// guard is dropped. Fails with `BufferPoolFull` when every frame is
    /// pinned.
    pub fn new_page(&self) -> Result<BasicPageGuard> {
        let (page_id, frame_id) = {
            let mut core = self.state.latch.lock();

            let page_id = self.disk_scheduler.disk_manager().allocate_page()?;
            let frame_id = self.acquire_frame(&mut core)?;
            let frame = &self.state.frames[frame_id.as_usize()];

            frame.reset();
            frame.set_page_id(page_id);
            frame.pin();

            core.page_table.insert(page_id, frame_id);
            self.state.replacer.record_access(frame_id)?;
            self.state.replacer.set_evictable(frame_id, false);

            (page_id, frame_id)
        };

        trace!(page_id = page_id.as_u32(), frame_id = frame_id.as_u32(), "new page");
        Ok(self.basic_guard(page_id, frame_id))
    }

    /// Fetches a page and returns an unlatched guard pinning it.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        Ok(self.basic_guard(page_id, frame_id))
    }

    /// Fetches a page for shared read access.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(ReadPageGuard::new(page_id, frame, self.release_callback()))
    }

    /// Fetches a page for exclusive write access.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(WritePageGuard::new(page_id, frame, self.release_callback()))
    }

    /// Gives back one pin on a page. Returns false when the page is not
    /// resident or not pinned. Guards call this automatically on drop.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin(page_id, is_dirty)
    }

    /// Writes a resident page to disk regardless of its dirty bit and
    /// clears the bit. Returns false when the page is not resident or the
    /// identifier is invalid.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let core = self.state.latch.lock();
        let Some(&frame_id) = core.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Flushes every resident page with a valid identifier.
    pub fn flush_all_pages(&self) -> Result<()> {
        let core = self.state.latch.lock();

        for (&page_id, &frame_id) in core.page_table.iter() {
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            let frame = &self.state.frames[frame_id.as_usize()];

            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
        }

        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk.
    ///
    /// Deleting a page that is not resident trivially succeeds. A pinned
    /// page cannot be deleted.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut core = self.state.latch.lock();

        let Some(&frame_id) = core.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Err(DbError::PageStillPinned(page_id));
        }

        core.page_table.remove(&page_id);
        // The frame was either evictable (pin 0) or never entered the
        // replacer; remove tolerates both.
        let _ = self.state.replacer.remove(frame_id);
        frame.reset();
        core.free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;

        debug!(page_id = page_id.as_u32(), "page deleted");
        Ok(true)
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let core = self.state.latch.lock();
        core.page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.latch.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    fn basic_guard(&self, page_id: PageId, frame_id: FrameId) -> BasicPageGuard {
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        BasicPageGuard::new(page_id, frame, self.release_callback())
    }

    fn release_callback(&self) -> Box<dyn FnOnce(PageId, bool) + Send + Sync> {
        let state = Arc::clone(&self.state);
        Box::new(move |page_id, is_dirty| {
            state.unpin(page_id, is_dirty);
        })
    }

    /// Pins the page into a frame and returns the frame id.
    ///
    /// Holds the pool latch for the entire operation: a resident page is
    /// pinned in place, otherwise the miss, the frame claim (with any
    /// victim write-back), the disk read and the page-table install happen
    /// as one step. Two threads fetching the same absent page therefore
    /// always end up on the same frame.
    fn fetch_page(&self, page_id: PageId) -> Result<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut core = self.state.latch.lock();

        if let Some(&frame_id) = core.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id)?;
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame(&mut core)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            // The read failed before the mapping existed; the frame goes
            // straight back into circulation.
            core.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        core.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id)?;
        self.state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Claims a frame from the free list, or evicts one. A dirty victim is
    /// written back before the frame is handed out. Caller holds the pool
    /// latch.
    fn acquire_frame(&self, core: &mut PoolCore) -> Result<FrameId> {
        if let Some(frame_id) = core.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Err(DbError::BufferPoolFull);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
            debug!(
                victim = old_page_id.as_u32(),
                frame_id = frame_id.as_u32(),
                "evicted dirty page written back"
            );
        }

        core.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}
