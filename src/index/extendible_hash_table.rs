use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, INVALID_PAGE_ID};
use crate::storage::page::{
    bucket_capacity, HashBucketPage, HashBucketPageRef, HashDirectoryPage, HashDirectoryPageRef,
    HashHeaderPage, HashHeaderPageRef, HashKey, HashValue,
};

/// A disk-resident extendible hash table built on the buffer pool.
///
/// Three levels: one header page routes the top `header_max_depth` hash
/// bits to a directory page; the directory routes the bottom
/// `global_depth` bits to a bucket page; buckets hold the entries. Buckets
/// split (doubling the directory when needed) on overflow and merge with
/// their image on emptying, shrinking the directory back.
///
/// Lookups hold read guards level by level; mutations take write guards at
/// the levels they change. Keys are unique: inserting an existing key
/// fails.
pub struct DiskExtendibleHashTable<K, V> {
    bpm: Arc<BufferPoolManager>,
    header_page_id: PageId,
    directory_max_depth: u32,
    bucket_max_size: u32,
    _marker: PhantomData<(K, V)>,
}

impl<K: HashKey, V: HashValue> DiskExtendibleHashTable<K, V> {
    /// Creates a new hash table with the given routing depths and bucket
    /// capacity. `bucket_max_size` of 0 means "as many as fit in a page".
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: u32,
    ) -> Result<Self> {
        let bucket_max_size = if bucket_max_size == 0 {
            bucket_capacity::<K, V>()
        } else {
            bucket_max_size.min(bucket_capacity::<K, V>())
        };

        let guard = bpm.new_page()?;
        let header_page_id = guard.page_id();
        {
            let mut guard = guard.upgrade_write();
            let mut header = HashHeaderPage::new(guard.data_mut());
            header.init(header_max_depth);
        }

        Ok(Self {
            bpm,
            header_page_id,
            directory_max_depth,
            bucket_max_size,
            _marker: PhantomData,
        })
    }

    /// Opens an existing table anchored at `header_page_id`.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        header_page_id: PageId,
        directory_max_depth: u32,
        bucket_max_size: u32,
    ) -> Self {
        let bucket_max_size = if bucket_max_size == 0 {
            bucket_capacity::<K, V>()
        } else {
            bucket_max_size.min(bucket_capacity::<K, V>())
        };
        Self {
            bpm,
            header_page_id,
            directory_max_depth,
            bucket_max_size,
            _marker: PhantomData,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Looks up every value stored under `key` (zero or one, since keys
    /// are unique).
    pub fn get(&self, key: &K) -> Result<Vec<V>> {
        let hash = key.hash32();

        let directory_page_id = {
            let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
            let header = HashHeaderPageRef::new(header_guard.data());
            header.directory_page_id(header.hash_to_directory_index(hash))
        };
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(Vec::new());
        }

        let bucket_page_id = {
            let directory_guard = self.bpm.fetch_page_read(directory_page_id)?;
            let directory = HashDirectoryPageRef::new(directory_guard.data());
            directory.bucket_page_id(directory.hash_to_bucket_index(hash))
        };
        if bucket_page_id == INVALID_PAGE_ID {
            return Ok(Vec::new());
        }

        let bucket_guard = self.bpm.fetch_page_read(bucket_page_id)?;
        let bucket = HashBucketPageRef::<K, V>::new(bucket_guard.data());
        Ok(bucket.lookup(key).into_iter().collect())
    }

    /// Inserts a key/value pair.
    ///
    /// Returns false for a duplicate key, and for an overflowing bucket
    /// whose directory is already at maximum depth.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        if !self.get(key)?.is_empty() {
            return Ok(false);
        }

        let hash = key.hash32();

        // Route through the header; create the directory on first touch.
        let directory_page_id = {
            let mut header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
            let mut header = HashHeaderPage::new(header_guard.data_mut());
            let directory_idx = header.hash_to_directory_index(hash);
            let existing = header.directory_page_id(directory_idx);
            if existing == INVALID_PAGE_ID {
                let new_directory = self.new_directory_page()?;
                header.set_directory_page_id(directory_idx, new_directory);
                new_directory
            } else {
                existing
            }
        };

        let mut directory_guard = self.bpm.fetch_page_write(directory_page_id)?;
        let mut directory = HashDirectoryPage::new(directory_guard.data_mut());

        let bucket_idx = directory.hash_to_bucket_index(hash);
        let bucket_page_id = directory.bucket_page_id(bucket_idx);

        // First key routed to this slot: give it a bucket.
        if bucket_page_id == INVALID_PAGE_ID {
            let new_bucket = self.new_bucket_page()?;
            directory.set_bucket_page_id(bucket_idx, new_bucket);
            let mut bucket_guard = self.bpm.fetch_page_write(new_bucket)?;
            let mut bucket = HashBucketPage::<K, V>::new(bucket_guard.data_mut());
            return Ok(bucket.insert(*key, *value));
        }

        {
            let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
            let mut bucket = HashBucketPage::<K, V>::new(bucket_guard.data_mut());

            if !bucket.is_full() {
                return Ok(bucket.insert(*key, *value));
            }

            // Full bucket: grow the directory if this bucket uses every
            // global bit, then split it.
            if directory.local_depth(bucket_idx) == directory.global_depth() {
                if directory.global_depth() >= directory.max_depth() {
                    debug!(bucket_idx, "directory at max depth, insert refused");
                    return Ok(false);
                }
                directory.incr_global_depth();
            }

            self.split_bucket(&mut directory, &mut bucket, bucket_idx)?;
        }

        // The split may leave the target bucket full again; retry resolves
        // repeated overflow by splitting further.
        drop(directory_guard);
        self.insert(key, value)
    }

    /// Removes `key`. Merges emptied buckets with their image and shrinks
    /// the directory while no bucket uses every global bit.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let hash = key.hash32();

        let directory_page_id = {
            let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
            let header = HashHeaderPageRef::new(header_guard.data());
            header.directory_page_id(header.hash_to_directory_index(hash))
        };
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let mut directory_guard = self.bpm.fetch_page_write(directory_page_id)?;
        let mut directory = HashDirectoryPage::new(directory_guard.data_mut());

        let mut bucket_idx = directory.hash_to_bucket_index(hash);
        let bucket_page_id = directory.bucket_page_id(bucket_idx);
        if bucket_page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let removed = {
            let mut bucket_guard = self.bpm.fetch_page_write(bucket_page_id)?;
            let mut bucket = HashBucketPage::<K, V>::new(bucket_guard.data_mut());
            bucket.remove(key)
        };
        if !removed {
            return Ok(false);
        }

        // Merge while this bucket (or its image) is empty and both sides
        // discriminate on the same number of bits.
        let mut local_depth = directory.local_depth(bucket_idx);
        while local_depth > 0 {
            let image_idx = bucket_idx ^ (1usize << (local_depth - 1));
            if directory.local_depth(image_idx) != local_depth {
                break;
            }

            let current_page_id = directory.bucket_page_id(bucket_idx);
            let image_page_id = directory.bucket_page_id(image_idx);
            if image_page_id == INVALID_PAGE_ID || image_page_id == current_page_id {
                break;
            }

            let current_empty = self.bucket_is_empty(current_page_id)?;
            let image_empty = self.bucket_is_empty(image_page_id)?;
            if !current_empty && !image_empty {
                break;
            }

            let (survivor, dead) = if current_empty {
                (image_page_id, current_page_id)
            } else {
                (current_page_id, image_page_id)
            };

            let new_depth = local_depth - 1;
            let mask = (1usize << new_depth) - 1;
            let base = bucket_idx & mask;
            for i in 0..directory.size() {
                if i & mask == base {
                    directory.set_bucket_page_id(i, survivor);
                    directory.set_local_depth(i, new_depth as u8);
                }
            }

            self.bpm.delete_page(dead)?;
            trace!(
                survivor = survivor.as_u32(),
                dead = dead.as_u32(),
                new_depth,
                "buckets merged"
            );

            bucket_idx = base;
            local_depth = new_depth;
        }

        while directory.can_shrink() {
            directory.decr_global_depth();
        }

        Ok(true)
    }

    /// Splits the full bucket at `bucket_idx`, redistributing its entries
    /// between it and a freshly allocated image bucket.
    ///
    /// Every directory slot sharing the bucket's low `local_depth` bits
    /// moves to depth `local_depth + 1`; the half with the new bit set is
    /// repointed at the image bucket.
    fn split_bucket(
        &self,
        directory: &mut HashDirectoryPage<'_>,
        bucket: &mut HashBucketPage<'_, K, V>,
        bucket_idx: usize,
    ) -> Result<()> {
        let local_depth = directory.local_depth(bucket_idx);
        debug_assert!(local_depth < directory.global_depth());

        let split_page_id = self.new_bucket_page()?;
        let mut split_guard = self.bpm.fetch_page_write(split_page_id)?;
        let mut split_bucket = HashBucketPage::<K, V>::new(split_guard.data_mut());

        let old_mask = (1usize << local_depth) - 1;
        let base = bucket_idx & old_mask;
        let new_bit = 1usize << local_depth;
        for i in 0..directory.size() {
            if i & old_mask == base {
                directory.set_local_depth(i, (local_depth + 1) as u8);
                if i & new_bit != 0 {
                    directory.set_bucket_page_id(i, split_page_id);
                }
            }
        }

        let entries = bucket.entries();
        bucket.clear();
        for (key, value) in entries {
            let target_idx = directory.hash_to_bucket_index(key.hash32());
            if directory.bucket_page_id(target_idx) == split_page_id {
                split_bucket.insert(key, value);
            } else {
                bucket.insert(key, value);
            }
        }

        debug!(
            split_page = split_page_id.as_u32(),
            new_depth = local_depth + 1,
            "bucket split"
        );
        Ok(())
    }

    fn bucket_is_empty(&self, page_id: PageId) -> Result<bool> {
        let guard = self.bpm.fetch_page_read(page_id)?;
        let bucket = HashBucketPageRef::<K, V>::new(guard.data());
        Ok(bucket.is_empty())
    }

    fn new_directory_page(&self) -> Result<PageId> {
        let guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        let mut guard = guard.upgrade_write();
        let mut directory = HashDirectoryPage::new(guard.data_mut());
        directory.init(self.directory_max_depth);
        Ok(page_id)
    }

    fn new_bucket_page(&self) -> Result<PageId> {
        let guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        let mut guard = guard.upgrade_write();
        let mut bucket = HashBucketPage::<K, V>::new(guard.data_mut());
        bucket.init(self.bucket_max_size);
        Ok(page_id)
    }

    /// Global depth of the directory a hash routes to; None when that
    /// directory does not exist yet. Test and inspection hook.
    pub fn directory_global_depth(&self, hash: u32) -> Result<Option<u32>> {
        let directory_page_id = {
            let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
            let header = HashHeaderPageRef::new(header_guard.data());
            header.directory_page_id(header.hash_to_directory_index(hash))
        };
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let guard = self.bpm.fetch_page_read(directory_page_id)?;
        let directory = HashDirectoryPageRef::new(guard.data());
        Ok(Some(directory.global_depth()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    /// Key whose hash is the key itself, pinning entries to chosen slots.
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct IdentityKey(u32);

    impl HashKey for IdentityKey {
        const ENCODED_SIZE: usize = 4;

        fn encode(&self, buf: &mut [u8]) {
            buf[..4].copy_from_slice(&self.0.to_le_bytes());
        }

        fn decode(buf: &[u8]) -> Self {
            IdentityKey(u32::from_le_bytes(buf[..4].try_into().unwrap()))
        }

        fn hash32(&self) -> u32 {
            self.0
        }
    }

    fn create_table(
        pool_size: usize,
        header_depth: u32,
        directory_depth: u32,
        bucket_size: u32,
    ) -> (DiskExtendibleHashTable<IdentityKey, u32>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, dm));
        let table =
            DiskExtendibleHashTable::new(bpm, header_depth, directory_depth, bucket_size).unwrap();
        (table, temp_file)
    }

    #[test]
    fn test_hash_table_insert_and_get() {
        let (table, _temp) = create_table(16, 0, 3, 4);

        for i in 0..8u32 {
            assert!(table.insert(&IdentityKey(i), &(i * 100)).unwrap());
        }
        for i in 0..8u32 {
            assert_eq!(table.get(&IdentityKey(i)).unwrap(), vec![i * 100]);
        }
        assert!(table.get(&IdentityKey(99)).unwrap().is_empty());
    }

    #[test]
    fn test_hash_table_duplicate_insert_refused() {
        let (table, _temp) = create_table(16, 0, 3, 4);

        assert!(table.insert(&IdentityKey(1), &10).unwrap());
        assert!(!table.insert(&IdentityKey(1), &20).unwrap());
        assert_eq!(table.get(&IdentityKey(1)).unwrap(), vec![10]);
    }

    #[test]
    fn test_hash_table_split_redistributes() {
        // Keys 0b000, 0b100, 0b010, 0b110 with capacity-2 buckets: after
        // the splits the directory discriminates on the low two bits.
        let (table, _temp) = create_table(16, 0, 3, 2);

        for key in [0b000u32, 0b100, 0b010, 0b110] {
            assert!(table.insert(&IdentityKey(key), &key).unwrap());
        }

        assert_eq!(table.directory_global_depth(0).unwrap(), Some(2));
        for key in [0b000u32, 0b100, 0b010, 0b110] {
            assert_eq!(table.get(&IdentityKey(key)).unwrap(), vec![key]);
        }
    }

    #[test]
    fn test_hash_table_directory_full_refuses_insert() {
        // One directory bit and one-entry buckets: keys 0 and 1 fill the
        // table, a third colliding key cannot split further.
        let (table, _temp) = create_table(16, 0, 1, 1);

        assert!(table.insert(&IdentityKey(0b0), &0).unwrap());
        assert!(table.insert(&IdentityKey(0b1), &1).unwrap());
        assert!(!table.insert(&IdentityKey(0b10), &2).unwrap());

        // The refused insert left the table unchanged.
        assert_eq!(table.get(&IdentityKey(0)).unwrap(), vec![0]);
        assert_eq!(table.get(&IdentityKey(1)).unwrap(), vec![1]);
        assert!(table.get(&IdentityKey(0b10)).unwrap().is_empty());
    }

    #[test]
    fn test_hash_table_remove() {
        let (table, _temp) = create_table(16, 0, 3, 4);

        for i in 0..8u32 {
            table.insert(&IdentityKey(i), &i).unwrap();
        }
        assert!(table.remove(&IdentityKey(3)).unwrap());
        assert!(!table.remove(&IdentityKey(3)).unwrap());

        assert!(table.get(&IdentityKey(3)).unwrap().is_empty());
        for i in (0..8u32).filter(|&i| i != 3) {
            assert_eq!(table.get(&IdentityKey(i)).unwrap(), vec![i]);
        }
    }

    #[test]
    fn test_hash_table_merge_shrinks_directory() {
        let (table, _temp) = create_table(32, 0, 3, 2);

        let keys: Vec<u32> = (0..8).collect();
        for &key in &keys {
            table.insert(&IdentityKey(key), &key).unwrap();
        }
        assert!(table.directory_global_depth(0).unwrap() > Some(0));

        // Removing everything merges all buckets back into one and the
        // directory collapses to depth zero.
        for &key in &keys {
            assert!(table.remove(&IdentityKey(key)).unwrap());
        }
        assert_eq!(table.directory_global_depth(0).unwrap(), Some(0));

        // The table still works after the collapse.
        assert!(table.insert(&IdentityKey(5), &55).unwrap());
        assert_eq!(table.get(&IdentityKey(5)).unwrap(), vec![55]);
    }

    #[test]
    fn test_hash_table_remove_in_reverse_order() {
        let (table, _temp) = create_table(32, 0, 3, 2);

        let keys: Vec<u32> = (0..8).collect();
        for &key in &keys {
            table.insert(&IdentityKey(key), &key).unwrap();
        }
        for &key in keys.iter().rev() {
            assert!(table.remove(&IdentityKey(key)).unwrap());
        }
        assert_eq!(table.directory_global_depth(0).unwrap(), Some(0));
    }

    #[test]
    fn test_hash_table_header_routing() {
        // Two header bits: keys with different top bits land in different
        // directories.
        let (table, _temp) = create_table(32, 2, 3, 4);

        let low = IdentityKey(0x0000_0001);
        let high = IdentityKey(0xc000_0001);
        assert!(table.insert(&low, &1).unwrap());
        assert!(table.insert(&high, &2).unwrap());

        assert_eq!(table.get(&low).unwrap(), vec![1]);
        assert_eq!(table.get(&high).unwrap(), vec![2]);
        // Distinct directories were created for the two regions.
        assert_eq!(table.directory_global_depth(low.0).unwrap(), Some(0));
        assert_eq!(table.directory_global_depth(high.0).unwrap(), Some(0));
    }

    #[test]
    fn test_hash_table_many_keys_roundtrip() {
        let (table, _temp) = create_table(64, 1, 6, 8);

        for i in 0..500u32 {
            // Spread keys over the whole hash space.
            let key = IdentityKey(i.wrapping_mul(0x9e37_79b9));
            assert!(table.insert(&key, &i).unwrap(), "insert failed for {}", i);
        }
        for i in 0..500u32 {
            let key = IdentityKey(i.wrapping_mul(0x9e37_79b9));
            assert_eq!(table.get(&key).unwrap(), vec![i]);
        }
    }
}
