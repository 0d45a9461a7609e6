use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::common::{DbError, PageId, Result, PAGE_SIZE};

use super::DiskManager;

/// Represents a disk I/O request
pub struct DiskRequest {
    /// Whether this is a write (true) or read (false) request
    pub is_write: bool,
    /// The page ID to read/write
    pub page_id: PageId,
    /// Pointer to the data buffer (must be PAGE_SIZE bytes)
    /// For reads: data will be written here
    /// For writes: data will be read from here
    pub data: *mut u8,
    /// Completion signal: receives true on success, false on I/O failure
    pub callback: Option<std::sync::mpsc::Sender<bool>>,
}

// Safety: a request is handed to the worker thread exactly once and the
// caller keeps the data pointer valid until the callback fires.
unsafe impl Send for DiskRequest {}

impl DiskRequest {
    /// Creates a new read request
    pub fn read(page_id: PageId, data: *mut u8) -> Self {
        Self {
            is_write: false,
            page_id,
            data,
            callback: None,
        }
    }

    /// Creates a new write request
    pub fn write(page_id: PageId, data: *mut u8) -> Self {
        Self {
            is_write: true,
            page_id,
            data,
            callback: None,
        }
    }

    /// Sets the completion callback for this request
    pub fn with_callback(mut self, callback: std::sync::mpsc::Sender<bool>) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// DiskScheduler owns a background worker thread that serves disk I/O
/// requests in submission order.
///
/// Requests are queued over a channel; the worker performs the blocking
/// read or write against the [`DiskManager`] and fulfills each request's
/// completion signal. On drop the scheduler enqueues a shutdown sentinel,
/// which the worker honors only after draining every earlier request.
pub struct DiskScheduler {
    /// The disk manager for actual I/O operations
    disk_manager: Arc<DiskManager>,
    /// Channel sender for queuing requests; None is the shutdown sentinel
    request_sender: Sender<Option<DiskRequest>>,
    /// Handle to the background worker thread
    worker_handle: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Creates a new DiskScheduler and spawns its worker thread.
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (sender, receiver) = bounded::<Option<DiskRequest>>(128);

        let dm_clone = Arc::clone(&disk_manager);
        let worker_handle = thread::spawn(move || {
            Self::run_worker(dm_clone, receiver);
        });

        Self {
            disk_manager,
            request_sender: sender,
            worker_handle: Some(worker_handle),
        }
    }

    /// Schedules a disk request for processing by the background worker.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.request_sender
            .send(Some(request))
            .map_err(|e| DbError::DiskScheduler(format!("Failed to schedule request: {}", e)))
    }

    /// Schedules a read request and waits for completion.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = std::sync::mpsc::channel();
        let request = DiskRequest::read(page_id, data.as_mut_ptr()).with_callback(tx);

        self.schedule(request)?;
        Self::await_completion(rx, page_id)
    }

    /// Schedules a write request and waits for completion.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);

        let (tx, rx) = std::sync::mpsc::channel();
        // The worker only reads through the pointer for write requests.
        let request = DiskRequest::write(page_id, data.as_ptr() as *mut u8).with_callback(tx);

        self.schedule(request)?;
        Self::await_completion(rx, page_id)
    }

    fn await_completion(rx: std::sync::mpsc::Receiver<bool>, page_id: PageId) -> Result<()> {
        let ok = rx.recv().map_err(|e| {
            DbError::DiskScheduler(format!("Failed to receive completion: {}", e))
        })?;
        if !ok {
            return Err(DbError::DiskScheduler(format!("I/O failed for {}", page_id)));
        }
        Ok(())
    }

    /// Worker loop: serve requests FIFO until the sentinel (or a closed
    /// channel) is seen.
    fn run_worker(disk_manager: Arc<DiskManager>, receiver: Receiver<Option<DiskRequest>>) {
        while let Ok(message) = receiver.recv() {
            match message {
                Some(request) => Self::process_request(&disk_manager, request),
                None => {
                    debug!("disk scheduler worker shutting down");
                    break;
                }
            }
        }
    }

    /// Processes a single disk request and signals its outcome.
    fn process_request(disk_manager: &DiskManager, request: DiskRequest) {
        let success = if request.is_write {
            // Safety: caller guarantees the pointer covers PAGE_SIZE bytes.
            let data = unsafe { std::slice::from_raw_parts(request.data, PAGE_SIZE) };
            disk_manager.write_page(request.page_id, data).is_ok()
        } else {
            // Safety: caller guarantees the pointer covers PAGE_SIZE bytes.
            let data = unsafe { std::slice::from_raw_parts_mut(request.data, PAGE_SIZE) };
            disk_manager.read_page(request.page_id, data).is_ok()
        };

        trace!(
            page_id = request.page_id.as_u32(),
            is_write = request.is_write,
            success,
            "disk request processed"
        );

        // A failed request only fails its own signal; the worker moves on.
        if let Some(callback) = request.callback {
            let _ = callback.send(success);
        }
    }

    /// Returns a reference to the underlying DiskManager.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Enqueue the sentinel; earlier requests drain first.
        let _ = self.request_sender.send(None);

        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_scheduler_read_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = scheduler.disk_manager().allocate_page().unwrap();

        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[100] = 255;
        scheduler.schedule_write_sync(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_disk_scheduler_fifo_order() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let scheduler = DiskScheduler::new(dm);

        let page_id = scheduler.disk_manager().allocate_page().unwrap();

        // Two writes to the same page: the later submission must win.
        let first = [1u8; PAGE_SIZE];
        let second = [2u8; PAGE_SIZE];
        scheduler.schedule_write_sync(page_id, &first).unwrap();
        scheduler.schedule_write_sync(page_id, &second).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        scheduler
            .schedule_read_sync(page_id, &mut read_data)
            .unwrap();
        assert_eq!(read_data[0], 2);
    }

    #[test]
    fn test_disk_scheduler_shutdown_drains_queue() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        let page_id;
        {
            let dm = Arc::new(DiskManager::new(&path).unwrap());
            let scheduler = DiskScheduler::new(dm);
            page_id = scheduler.disk_manager().allocate_page().unwrap();

            let data = [9u8; PAGE_SIZE];
            scheduler.schedule_write_sync(page_id, &data).unwrap();
            // Dropping the scheduler joins the worker after the queue drains.
        }

        let dm = DiskManager::new(&path).unwrap();
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut data).unwrap();
        assert_eq!(data[0], 9);
    }
}
