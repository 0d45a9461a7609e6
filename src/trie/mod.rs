mod store;
mod trie;

pub use store::{TrieStore, ValueGuard};
pub use trie::Trie;
