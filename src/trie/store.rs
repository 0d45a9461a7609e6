use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Trie;

/// Keeps a value from the store alive independently of later writes.
///
/// The guard pins the trie version the value was read from, so removing or
/// replacing the key afterwards never invalidates an outstanding guard.
pub struct ValueGuard<T> {
    /// The trie version this value was read from
    _root: Trie,
    value: Arc<T>,
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// A thread-safe key-value store layered over the copy-on-write [`Trie`].
///
/// Readers snapshot the current root under a short critical section and
/// search outside it; writers serialize among themselves and compute the
/// new trie outside the root lock, so readers never wait for a write to
/// finish and writers never wait for readers.
#[derive(Default)]
pub struct TrieStore {
    /// Guards only the root pointer swap
    root: Mutex<Trie>,
    /// Serializes writers; never held while readers snapshot
    write_lock: Mutex<()>,
}

impl TrieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key` against the current version of the trie.
    ///
    /// The returned guard stays valid for as long as the caller holds it,
    /// regardless of concurrent `put`/`remove` calls.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<ValueGuard<T>> {
        let root = self.root.lock().clone();
        let value = root.get_arc::<T>(key)?;
        Some(ValueGuard { _root: root, value })
    }

    /// Maps `key` to `value`, replacing any existing value.
    pub fn put<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        let _writer = self.write_lock.lock();

        let snapshot = self.root.lock().clone();
        let new_root = snapshot.put(key, value);
        *self.root.lock() = new_root;
    }

    /// Removes the value at `key`, if any.
    pub fn remove(&self, key: &str) {
        let _writer = self.write_lock.lock();

        let snapshot = self.root.lock().clone();
        let new_root = snapshot.remove(key);
        *self.root.lock() = new_root;
    }
}
