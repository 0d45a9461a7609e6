use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::FrameHeader;

/// Callback invoked exactly once when a guard releases its frame.
/// Receives the page id and whether the guard dirtied the page.
type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// Shared plumbing of all guard flavors: the pin on the frame and the
/// release callback that gives it back to the pool.
struct PageGuardBase {
    /// The page ID being guarded
    page_id: PageId,
    /// The pinned frame (kept alive for the guard's lifetime)
    frame: Arc<FrameHeader>,
    /// Callback to release the pin
    release_callback: Option<ReleaseCallback>,
    /// Whether this guard dirtied the page
    is_dirty: bool,
}

impl PageGuardBase {
    fn new(page_id: PageId, frame: Arc<FrameHeader>, release_callback: ReleaseCallback) -> Self {
        Self {
            page_id,
            frame,
            release_callback: Some(release_callback),
            is_dirty: false,
        }
    }

    fn release(&mut self) {
        if let Some(callback) = self.release_callback.take() {
            callback(self.page_id, self.is_dirty);
        }
    }
}

/// RAII holder of a frame pin without any page latch.
///
/// Useful for keeping a page resident across latch acquisitions; upgrade to
/// a [`ReadPageGuard`] or [`WritePageGuard`] to actually touch the bytes.
/// Dropping the guard unpins the page with the recorded dirty flag.
pub struct BasicPageGuard {
    base: Option<PageGuardBase>,
}

impl BasicPageGuard {
    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        release_callback: ReleaseCallback,
    ) -> Self {
        Self {
            base: Some(PageGuardBase::new(page_id, frame, release_callback)),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.as_ref().unwrap().page_id
    }

    /// Upgrades into a read guard, taking the page's shared latch.
    /// The pin transfers without ever being dropped.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let base = self.base.take().unwrap();
        ReadPageGuard::from_base(base)
    }

    /// Upgrades into a write guard, taking the page's exclusive latch.
    /// The pin transfers without ever being dropped.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let base = self.base.take().unwrap();
        WritePageGuard::from_base(base)
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let Some(mut base) = self.base.take() {
            base.release();
        }
    }
}

/// RAII guard for read-only access to a page: a pin plus the shared latch.
pub struct ReadPageGuard {
    base: PageGuardBase,
    /// Shared latch on the page data; Option so drop can order releases
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    fn from_base(base: PageGuardBase) -> Self {
        let data_guard = base.frame.data.read();
        // Safety: the guard's lifetime is tied to the frame, which the base
        // keeps alive via Arc for as long as this guard exists.
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_guard) };

        Self {
            base,
            data_guard: Some(data_guard),
        }
    }

    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        release_callback: ReleaseCallback,
    ) -> Self {
        Self::from_base(PageGuardBase::new(page_id, frame, release_callback))
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the latch before reporting the pin back to the pool.
        self.data_guard.take();
        self.base.release();
    }
}

/// RAII guard for exclusive access to a page: a pin plus the exclusive
/// latch. Holding exclusive access is taken as mutation: the drop path
/// always reports the page dirty, whether or not the bytes were touched.
pub struct WritePageGuard {
    base: PageGuardBase,
    /// Exclusive latch on the page data; Option so drop can order releases
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    fn from_base(base: PageGuardBase) -> Self {
        let data_guard = base.frame.data.write();
        // Safety: as for ReadPageGuard, the Arc in the base outlives the
        // transmuted lock guard.
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_guard) };

        Self {
            base,
            data_guard: Some(data_guard),
        }
    }

    pub(crate) fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        release_callback: ReleaseCallback,
    ) -> Self {
        Self::from_base(PageGuardBase::new(page_id, frame, release_callback))
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Mutable view of the page bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Exclusive access forces the dirty bit regardless of what the
        // holder did with the bytes.
        self.base.is_dirty = true;
        // Release the latch before reporting the pin back to the pool.
        self.data_guard.take();
        self.base.release();
    }
}
