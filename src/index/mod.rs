mod extendible_hash_table;
mod hash_index;

pub use extendible_hash_table::DiskExtendibleHashTable;
pub use hash_index::{HashIndex, Index};
