use crate::common::{DbError, PageId, Result, SlotId, TxnId, INVALID_PAGE_ID, PAGE_SIZE};

/// Table page layout:
///
/// ```text
/// +--------------------+
/// | Header (16 bytes)  |  page_id, next_page_id, slot count, free bounds
/// +--------------------+
/// | Slot Array         |  (offset: u16, length: u16) per slot, grows down
/// +--------------------+
/// | Free Space         |
/// +--------------------+
/// | Tuple Payloads     |  meta prefix + tuple bytes, grows up from bottom
/// +--------------------+
/// ```
///
/// Each payload starts with the tuple's metadata (txn id and delete flag),
/// so `update_tuple_meta` rewrites 9 bytes in place without moving data.
/// Pages of one table form a singly linked list through `next_page_id`.
const PAGE_ID_OFFSET: usize = 0;
const NEXT_PAGE_ID_OFFSET: usize = 4;
const NUM_SLOTS_OFFSET: usize = 8;
const FREE_SPACE_START_OFFSET: usize = 10;
const FREE_SPACE_END_OFFSET: usize = 12;

const HEADER_SIZE: usize = 16;
const SLOT_SIZE: usize = 4;

/// Serialized size of a TupleMeta prefix (txn_id + deleted flag)
const TUPLE_META_SIZE: usize = 9;

/// Metadata stored alongside every tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleMeta {
    /// Transaction that last wrote this tuple
    pub txn_id: TxnId,
    /// Whether the tuple is deleted
    pub is_deleted: bool,
}

impl TupleMeta {
    pub fn new(txn_id: TxnId, is_deleted: bool) -> Self {
        Self { txn_id, is_deleted }
    }

    fn write_to(&self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.txn_id.to_le_bytes());
        buf[8] = u8::from(self.is_deleted);
    }

    fn read_from(buf: &[u8]) -> Self {
        Self {
            txn_id: u64::from_le_bytes(buf[..8].try_into().unwrap()),
            is_deleted: buf[8] != 0,
        }
    }
}

macro_rules! header_u16 {
    ($get:ident, $set:ident, $offset:expr) => {
        fn $get(data: &[u8]) -> u16 {
            u16::from_le_bytes(data[$offset..$offset + 2].try_into().unwrap())
        }
        fn $set(data: &mut [u8], value: u16) {
            data[$offset..$offset + 2].copy_from_slice(&value.to_le_bytes());
        }
    };
}

header_u16!(get_num_slots, set_num_slots, NUM_SLOTS_OFFSET);
header_u16!(get_free_start, set_free_start, FREE_SPACE_START_OFFSET);
header_u16!(get_free_end, set_free_end, FREE_SPACE_END_OFFSET);

fn get_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn set_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn slot_offset(slot_id: SlotId) -> usize {
    HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE
}

fn read_slot(data: &[u8], slot_id: SlotId) -> (u16, u16) {
    let base = slot_offset(slot_id);
    (
        u16::from_le_bytes(data[base..base + 2].try_into().unwrap()),
        u16::from_le_bytes(data[base + 2..base + 4].try_into().unwrap()),
    )
}

fn locate_tuple(data: &[u8], slot_id: SlotId) -> Result<(usize, usize)> {
    if slot_id.as_u16() >= get_num_slots(data) {
        return Err(DbError::InvalidSlotId(slot_id.as_u16()));
    }
    let (offset, length) = read_slot(data, slot_id);
    if length == 0 {
        return Err(DbError::EmptySlot(slot_id.as_u16()));
    }
    Ok((offset as usize, length as usize))
}

/// Mutable view of a table page.
pub struct TablePage<'a> {
    data: &'a mut [u8],
}

impl<'a> TablePage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh table page.
    pub fn init(&mut self, page_id: PageId) {
        self.data.fill(0);
        set_u32(self.data, PAGE_ID_OFFSET, page_id.as_u32());
        set_u32(self.data, NEXT_PAGE_ID_OFFSET, INVALID_PAGE_ID.as_u32());
        set_num_slots(self.data, 0);
        set_free_start(self.data, HEADER_SIZE as u16);
        set_free_end(self.data, PAGE_SIZE as u16);
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        let value = get_u32(self.data, NEXT_PAGE_ID_OFFSET);
        (value != INVALID_PAGE_ID.as_u32()).then(|| PageId::new(value))
    }

    pub fn set_next_page_id(&mut self, page_id: Option<PageId>) {
        let value = page_id.unwrap_or(INVALID_PAGE_ID).as_u32();
        set_u32(self.data, NEXT_PAGE_ID_OFFSET, value);
    }

    /// Number of slots in this page, deleted tuples included.
    pub fn tuple_count(&self) -> usize {
        get_num_slots(self.data) as usize
    }

    /// Free bytes left for one more tuple (slot entry included).
    pub fn free_space(&self) -> usize {
        let start = get_free_start(self.data) as usize;
        let end = get_free_end(self.data) as usize;
        (end - start).saturating_sub(SLOT_SIZE)
    }

    /// Returns true when a tuple of `tuple_size` serialized bytes fits.
    pub fn can_insert(&self, tuple_size: usize) -> bool {
        self.free_space() >= TUPLE_META_SIZE + tuple_size
    }

    /// Appends a tuple with its metadata; None when the page is full.
    pub fn insert_tuple(&mut self, meta: TupleMeta, tuple: &[u8]) -> Option<SlotId> {
        let payload_size = TUPLE_META_SIZE + tuple.len();
        if !self.can_insert(tuple.len()) {
            return None;
        }

        let slot_id = SlotId::new(get_num_slots(self.data));
        let payload_end = get_free_end(self.data) as usize;
        let payload_start = payload_end - payload_size;

        meta.write_to(&mut self.data[payload_start..payload_start + TUPLE_META_SIZE]);
        self.data[payload_start + TUPLE_META_SIZE..payload_end].copy_from_slice(tuple);

        let base = slot_offset(slot_id);
        self.data[base..base + 2].copy_from_slice(&(payload_start as u16).to_le_bytes());
        self.data[base + 2..base + 4].copy_from_slice(&(payload_size as u16).to_le_bytes());

        set_num_slots(self.data, slot_id.as_u16() + 1);
        set_free_start(self.data, (base + SLOT_SIZE) as u16);
        set_free_end(self.data, payload_start as u16);

        Some(slot_id)
    }

    /// Reads a tuple's metadata and serialized bytes.
    pub fn get_tuple(&self, slot_id: SlotId) -> Result<(TupleMeta, &[u8])> {
        let (offset, length) = locate_tuple(self.data, slot_id)?;
        let meta = TupleMeta::read_from(&self.data[offset..]);
        Ok((meta, &self.data[offset + TUPLE_META_SIZE..offset + length]))
    }

    /// Rewrites a tuple's metadata in place.
    pub fn update_tuple_meta(&mut self, meta: TupleMeta, slot_id: SlotId) -> Result<()> {
        let (offset, _) = locate_tuple(self.data, slot_id)?;
        meta.write_to(&mut self.data[offset..offset + TUPLE_META_SIZE]);
        Ok(())
    }

    /// Iterates the slot ids of this page.
    pub fn slot_ids(&self) -> impl Iterator<Item = SlotId> {
        (0..get_num_slots(self.data)).map(SlotId::new)
    }
}

/// Read-only view of a table page.
pub struct TablePageRef<'a> {
    data: &'a [u8],
}

impl<'a> TablePageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        let value = get_u32(self.data, NEXT_PAGE_ID_OFFSET);
        (value != INVALID_PAGE_ID.as_u32()).then(|| PageId::new(value))
    }

    pub fn tuple_count(&self) -> usize {
        get_num_slots(self.data) as usize
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<(TupleMeta, &[u8])> {
        let (offset, length) = locate_tuple(self.data, slot_id)?;
        let meta = TupleMeta::read_from(&self.data[offset..]);
        Ok((meta, &self.data[offset + TUPLE_META_SIZE..offset + length]))
    }

    pub fn slot_ids(&self) -> impl Iterator<Item = SlotId> {
        (0..get_num_slots(self.data)).map(SlotId::new)
    }
}

// The header and one slot must always fit.
const _: () = assert!(HEADER_SIZE + SLOT_SIZE + TUPLE_META_SIZE < PAGE_SIZE);
