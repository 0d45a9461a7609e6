//! Integration tests for the disk extendible hash table and hash index

use std::sync::Arc;

use grebe::buffer::BufferPoolManager;
use grebe::common::{PageId, RecordId, SlotId, INVALID_TXN_ID};
use grebe::index::{DiskExtendibleHashTable, HashIndex, Index};
use grebe::storage::disk::DiskManager;
use grebe::tuple::{DataType, Schema, TupleBuilder};
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (Arc::new(BufferPoolManager::new(pool_size, 2, dm)), temp_file)
}

#[test]
fn test_hash_table_insert_then_query_all() {
    let (bpm, _temp) = create_bpm(64);
    let table = DiskExtendibleHashTable::<u64, u32>::new(bpm, 1, 6, 8).unwrap();

    for i in 0..300u32 {
        assert!(table.insert(&(i as u64 * 31), &i).unwrap());
    }
    for i in 0..300u32 {
        assert_eq!(table.get(&(i as u64 * 31)).unwrap(), vec![i]);
    }
    assert!(table.get(&999_999).unwrap().is_empty());
}

#[test]
fn test_hash_table_duplicate_leaves_map_unchanged() {
    let (bpm, _temp) = create_bpm(32);
    let table = DiskExtendibleHashTable::<u64, u32>::new(bpm, 0, 4, 4).unwrap();

    for i in 0..20u32 {
        assert!(table.insert(&(i as u64), &i).unwrap());
    }
    for i in 0..20u32 {
        assert!(!table.insert(&(i as u64), &(i + 1000)).unwrap());
    }
    for i in 0..20u32 {
        assert_eq!(table.get(&(i as u64)).unwrap(), vec![i]);
    }
}

#[test]
fn test_hash_table_remove_all_collapses_directory() {
    let (bpm, _temp) = create_bpm(64);
    let table = DiskExtendibleHashTable::<u64, u32>::new(bpm, 0, 5, 2).unwrap();

    let keys: Vec<u64> = (0..64).map(|i| i * 1234567).collect();
    for (i, &key) in keys.iter().enumerate() {
        assert!(table.insert(&key, &(i as u32)).unwrap());
    }
    // Small buckets force real splits.
    assert!(table.directory_global_depth(0).unwrap() > Some(0));

    for &key in &keys {
        assert!(table.remove(&key).unwrap());
    }
    for &key in &keys {
        assert!(table.get(&key).unwrap().is_empty());
    }

    // With every bucket empty the merges cascade and the directory
    // shrinks back to a single slot.
    assert_eq!(table.directory_global_depth(0).unwrap(), Some(0));
}

#[test]
fn test_hash_table_remove_interleaved_with_lookups() {
    let (bpm, _temp) = create_bpm(64);
    let table = DiskExtendibleHashTable::<u64, u32>::new(bpm, 0, 5, 4).unwrap();

    let keys: Vec<u64> = (0..40).map(|i| i * 7919).collect();
    for (i, &key) in keys.iter().enumerate() {
        table.insert(&key, &(i as u32)).unwrap();
    }

    // Remove the even-positioned keys; odd ones must survive every merge.
    for (i, &key) in keys.iter().enumerate() {
        if i % 2 == 0 {
            assert!(table.remove(&key).unwrap());
        }
    }
    for (i, &key) in keys.iter().enumerate() {
        let expected: Vec<u32> = if i % 2 == 0 { vec![] } else { vec![i as u32] };
        assert_eq!(table.get(&key).unwrap(), expected);
    }

    assert!(!table.remove(&keys[0]).unwrap());
}

#[test]
fn test_hash_table_survives_tiny_buffer_pool() {
    // Every level of the table fights for the same handful of frames.
    let (bpm, _temp) = create_bpm(8);
    let table = DiskExtendibleHashTable::<u64, u32>::new(bpm, 1, 4, 8).unwrap();

    for i in 0..100u32 {
        assert!(table.insert(&(i as u64 * 101), &i).unwrap());
    }
    for i in 0..100u32 {
        assert_eq!(table.get(&(i as u64 * 101)).unwrap(), vec![i]);
    }
}

#[test]
fn test_hash_index_tracks_table_rows() {
    let (bpm, _temp) = create_bpm(64);
    let key_schema = Schema::builder().column("id", DataType::Integer).build_arc();
    let index = HashIndex::new(bpm, Arc::clone(&key_schema), vec![0], 0, 6, 0).unwrap();

    let key = |id: i32| TupleBuilder::new(Arc::clone(&key_schema)).value(id).build();
    let rid = |n: u32| RecordId::new(PageId::new(n), SlotId::new(0));

    for i in 0..64 {
        assert!(index.insert_entry(&key(i), rid(i as u32), INVALID_TXN_ID).unwrap());
    }
    for i in 0..64 {
        assert_eq!(
            index.scan_key(&key(i), INVALID_TXN_ID).unwrap(),
            vec![rid(i as u32)]
        );
    }

    assert!(index.delete_entry(&key(10), rid(10), INVALID_TXN_ID).unwrap());
    assert!(index.scan_key(&key(10), INVALID_TXN_ID).unwrap().is_empty());
    assert_eq!(
        index.scan_key(&key(11), INVALID_TXN_ID).unwrap(),
        vec![rid(11)]
    );
}
