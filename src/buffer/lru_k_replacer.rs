use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{DbError, FrameId, Result, Timestamp};

/// Tracks access history for a single frame
#[derive(Debug, Default)]
struct LrukNode {
    /// The last k access timestamps, most recent at the back
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl LrukNode {
    /// The timestamp this node is ranked by.
    ///
    /// With the history capped at k entries the front is the first access
    /// while the frame has fewer than k accesses, and the k-th most recent
    /// access once it has k. Both partitions evict their smallest rank.
    fn rank(&self) -> Timestamp {
        *self.history.front().expect("ranked node has no history")
    }

    fn has_k_accesses(&self, k: usize) -> bool {
        self.history.len() >= k
    }
}

/// Mutable replacer state, all behind one mutex
#[derive(Default)]
struct ReplacerState {
    node_store: HashMap<FrameId, LrukNode>,
    /// Evictable frames with fewer than k accesses, ranked by first access.
    /// These have infinite backward k-distance and are evicted first.
    history_rank: BTreeMap<Timestamp, FrameId>,
    /// Evictable frames with at least k accesses, ranked by the k-th most
    /// recent access. The smallest rank has the largest backward k-distance.
    cache_rank: BTreeMap<Timestamp, FrameId>,
    num_evictable: usize,
}

impl ReplacerState {
    fn insert_rank(&mut self, frame_id: FrameId, k: usize) {
        let node = &self.node_store[&frame_id];
        if node.has_k_accesses(k) {
            self.cache_rank.insert(node.rank(), frame_id);
        } else {
            self.history_rank.insert(node.rank(), frame_id);
        }
    }

    fn remove_rank(&mut self, frame_id: FrameId, k: usize) {
        let node = &self.node_store[&frame_id];
        if node.has_k_accesses(k) {
            self.cache_rank.remove(&node.rank());
        } else {
            self.history_rank.remove(&node.rank());
        }
    }
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame with the largest backward k-distance, i.e.
/// the greatest gap between now and its k-th most recent access. A frame
/// with fewer than k recorded accesses has infinite distance; ties among
/// such frames go to the one with the earliest overall access, which makes
/// k = 1 degrade to classical LRU.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    /// Monotonically increasing logical clock
    current_timestamp: AtomicU64,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and capacity.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k >= 1, "LRU-K needs k >= 1");
        Self {
            k,
            max_frames,
            current_timestamp: AtomicU64::new(0),
            state: Mutex::new(ReplacerState::default()),
        }
    }

    /// Evicts the frame with the largest backward k-distance and clears its
    /// access history. Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        if state.num_evictable == 0 {
            return None;
        }

        // Infinite-distance frames first, then the cache frame whose k-th
        // recent access lies furthest in the past.
        let (&rank, &frame_id) = state
            .history_rank
            .iter()
            .next()
            .or_else(|| state.cache_rank.iter().next())?;

        if state.history_rank.remove(&rank).is_none() {
            state.cache_rank.remove(&rank);
        }
        state.node_store.remove(&frame_id);
        state.num_evictable -= 1;

        Some(frame_id)
    }

    /// Records an access to the given frame at the current timestamp.
    /// A frame seen for the first time starts out non-evictable.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.max_frames {
            return Err(DbError::InvalidFrameId(frame_id));
        }

        let timestamp = self.current_timestamp.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();

        let node = state.node_store.entry(frame_id).or_default();
        let evictable = node.is_evictable;

        if evictable {
            state.remove_rank(frame_id, self.k);
        }

        let node = state.node_store.get_mut(&frame_id).unwrap();
        node.history.push_back(timestamp);
        while node.history.len() > self.k {
            node.history.pop_front();
        }

        if evictable {
            state.insert_rank(frame_id, self.k);
        }
        Ok(())
    }

    /// Sets whether a frame is evictable. The evictable count changes only
    /// on a real transition; unknown frames are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        let mut state = self.state.lock();

        let Some(node) = state.node_store.get_mut(&frame_id) else {
            return;
        };
        if node.is_evictable == is_evictable {
            return;
        }
        node.is_evictable = is_evictable;

        if is_evictable {
            state.num_evictable += 1;
            state.insert_rank(frame_id, self.k);
        } else {
            state.num_evictable -= 1;
            state.remove_rank(frame_id, self.k);
        }
    }

    /// Drops a frame's state entirely. The frame must be evictable; unknown
    /// frames are ignored.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        let mut state = self.state.lock();

        let Some(node) = state.node_store.get(&frame_id) else {
            return Ok(());
        };
        if !node.is_evictable {
            return Err(DbError::FrameNotEvictable(frame_id));
        }

        state.remove_rank(frame_id, self.k);
        state.node_store.remove(&frame_id);
        state.num_evictable -= 1;
        Ok(())
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
