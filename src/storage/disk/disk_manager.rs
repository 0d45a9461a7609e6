use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// DiskManager serves raw page I/O against a single database file.
///
/// Pages live at `page_id * PAGE_SIZE`; identifiers are handed out by a
/// monotonically increasing counter. Deallocation only records the page as
/// dead - identifiers are never recycled within a manager's lifetime.
pub struct DiskManager {
    /// The database file; the mutex serializes the shared cursor
    file: Mutex<File>,
    /// Path of the database file
    db_path: PathBuf,
    /// Number of pages allocated so far
    num_pages: AtomicU32,
    /// Number of single-page reads performed
    num_reads: AtomicU32,
    /// Number of single-page writes performed
    num_writes: AtomicU32,
    /// Number of pages handed back by deallocate_page
    num_deallocated: AtomicU32,
}

impl DiskManager {
    /// Opens (or creates) the database file at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file: Mutex::new(file),
            db_path,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
            num_deallocated: AtomicU32::new(0),
        })
    }

    /// Reads a page from disk into the provided buffer.
    /// Reading past the end of the file yields zeroes, matching a page that
    /// was allocated but never written back.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;

        let mut read_so_far = 0;
        while read_so_far < PAGE_SIZE {
            let n = file.read(&mut data[read_so_far..])?;
            if n == 0 {
                break;
            }
            read_so_far += n;
        }
        data[read_so_far..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a new page and returns its identifier.
    /// The page is zero-filled on disk so a later read observes a clean page.
    pub fn allocate_page(&self) -> Result<PageId> {
        let page_id = PageId::new(self.num_pages.fetch_add(1, Ordering::SeqCst));

        let zeros = [0u8; PAGE_SIZE];
        self.write_page(page_id, &zeros)?;

        Ok(page_id)
    }

    /// Marks a page as no longer in use. Identifiers are not recycled.
    pub fn deallocate_page(&self, _page_id: PageId) -> Result<()> {
        self.num_deallocated.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn num_deallocated(&self) -> u32 {
        self.num_deallocated.load(Ordering::Relaxed)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Forces all buffered writes to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.file.get_mut().sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_manager_new() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let dm = DiskManager::new(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(dm.num_pages(), 0);
    }

    #[test]
    fn test_disk_manager_allocate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dm = DiskManager::new(temp_dir.path().join("alloc.db")).unwrap();

        assert_eq!(dm.allocate_page().unwrap(), PageId::new(0));
        assert_eq!(dm.allocate_page().unwrap(), PageId::new(1));
        assert_eq!(dm.num_pages(), 2);
    }

    #[test]
    fn test_disk_manager_read_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dm = DiskManager::new(temp_dir.path().join("rw.db")).unwrap();

        let page_id = dm.allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        write_data[PAGE_SIZE - 1] = 128;
        dm.write_page(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
        assert_eq!(read_data[PAGE_SIZE - 1], 128);
    }

    #[test]
    fn test_disk_manager_read_past_eof_zero_fills() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dm = DiskManager::new(temp_dir.path().join("eof.db")).unwrap();

        let mut data = [7u8; PAGE_SIZE];
        dm.read_page(PageId::new(50), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_persistence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("persist.db");

        let page_id;
        {
            let dm = DiskManager::new(&db_path).unwrap();
            page_id = dm.allocate_page().unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(page_id, &data).unwrap();
        }

        {
            let dm = DiskManager::new(&db_path).unwrap();
            assert_eq!(dm.num_pages(), 1);

            let mut data = [0u8; PAGE_SIZE];
            dm.read_page(page_id, &mut data).unwrap();
            assert_eq!(data[0], 123);
        }
    }
}
