use thiserror::Error;

use super::types::{FrameId, PageId};

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(FrameId),

    #[error("Frame {0} is not evictable")]
    FrameNotEvictable(FrameId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Page is full")]
    PageFull,

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Slot {0} is empty")]
    EmptySlot(u16),

    #[error("Hash directory is at maximum depth")]
    DirectoryFull,

    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Index {0} not found")]
    IndexNotFound(u32),

    #[error("Malformed tuple data")]
    CorruptTuple,

    #[error("Plan node {0} has no executor")]
    Unexecutable(&'static str),
}

pub type Result<T> = std::result::Result<T, DbError>;
