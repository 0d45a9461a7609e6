mod hash_bucket_page;
mod hash_directory_page;
mod hash_header_page;
mod table_page;

pub use hash_bucket_page::{bucket_capacity, HashBucketPage, HashBucketPageRef, HashKey, HashValue};
pub use hash_directory_page::{HashDirectoryPage, HashDirectoryPageRef};
pub use hash_header_page::{HashHeaderPage, HashHeaderPageRef};
pub use table_page::{TablePage, TablePageRef, TupleMeta};
