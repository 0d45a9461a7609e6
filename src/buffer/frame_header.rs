use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// FrameHeader manages a single buffer frame: the page bytes it currently
/// backs plus the metadata the pool needs to pin, dirty-track and evict it.
/// The `data` RwLock doubles as the page latch taken by page guards.
pub struct FrameHeader {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    /// The page ID stored in this frame (INVALID_PAGE_ID if empty)
    page_id: RwLock<PageId>,
    /// Number of outstanding guards on this frame
    pin_count: AtomicU32,
    /// Whether the page differs from its on-disk image
    is_dirty: AtomicBool,
    /// The page bytes; the lock is the page's readers-writer latch
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: RwLock::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        *self.page_id.read()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        *self.page_id.write() = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Copies data from the given slice into the frame.
    pub fn copy_from(&self, data: &[u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(data);
    }

    /// Copies data from the frame into the given slice.
    pub fn copy_to(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.copy_from_slice(&**self.data.read());
    }

    /// Resets the frame to its initial, page-less state.
    pub fn reset(&self) {
        *self.page_id.write() = INVALID_PAGE_ID;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_header_new() {
        let frame = FrameHeader::new(FrameId::new(0));
        assert_eq!(frame.frame_id(), FrameId::new(0));
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_header_pin_unpin() {
        let frame = FrameHeader::new(FrameId::new(0));

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.pin_count(), 2);

        assert_eq!(frame.unpin(), Some(1));
        assert_eq!(frame.unpin(), Some(0));
        assert_eq!(frame.unpin(), None);
    }

    #[test]
    fn test_frame_header_data_roundtrip() {
        let frame = FrameHeader::new(FrameId::new(0));

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        data[PAGE_SIZE - 1] = 7;
        frame.copy_from(&data);

        let mut read_back = [0u8; PAGE_SIZE];
        frame.copy_to(&mut read_back);
        assert_eq!(read_back[0], 42);
        assert_eq!(read_back[PAGE_SIZE - 1], 7);
    }

    #[test]
    fn test_frame_header_reset() {
        let frame = FrameHeader::new(FrameId::new(0));

        frame.set_page_id(PageId::new(5));
        frame.pin();
        frame.set_dirty(true);
        let mut data = [1u8; PAGE_SIZE];
        frame.copy_from(&data);

        frame.reset();

        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        frame.copy_to(&mut data);
        assert_eq!(data[0], 0);
    }
}
