//! Grebe - the storage and execution substrate of a disk-oriented
//! teaching RDBMS.
//!
//! The engine keeps data on disk in fixed-size pages and caches them in a
//! buffer pool; everything above talks to pages through RAII guards.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page I/O and on-disk layouts
//!   - `DiskManager`: blocking page reads and writes against the database file
//!   - `DiskScheduler`: background worker serving page I/O in FIFO order
//!   - `TablePage`: slotted tuple storage with per-tuple metadata
//!   - `TableHeap`: a table as a linked chain of pages
//!   - hash table header/directory/bucket page layouts
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames, evicts with LRU-K
//!   - `LruKReplacer`: backward k-distance replacement policy
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: scoped pin and
//!     latch holders
//!
//! - **Trie** (`trie`): a copy-on-write trie plus a concurrent store with
//!   snapshot reads
//!
//! - **Index** (`index`): disk-resident extendible hash table and the
//!   tuple-keyed index facade over it
//!
//! - **Catalog** (`catalog`): in-memory table and index registry
//!
//! - **Execution** (`execution`): Volcano-style executors over plan trees
//!
//! - **Optimizer** (`optimizer`): rule-based plan rewrites
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use grebe::buffer::BufferPoolManager;
//! use grebe::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("demo.db").unwrap());
//! let bpm = BufferPoolManager::new(64, 2, disk_manager);
//!
//! // Allocate a page and write through a guard; the guard unpins on drop.
//! let page_id = {
//!     let guard = bpm.new_page().unwrap();
//!     let page_id = guard.page_id();
//!     let mut guard = guard.upgrade_write();
//!     guard.data_mut()[0] = 42;
//!     page_id
//! };
//!
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod index;
pub mod optimizer;
pub mod storage;
pub mod trie;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{DbError, FrameId, Oid, PageId, RecordId, Result, SlotId, TxnId};
