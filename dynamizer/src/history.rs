//! Recent-selection memory used to damp repeat enqueues.

use std::collections::VecDeque;

use tracing::trace;

/// A bounded, insertion-ordered set of recently-enqueued file paths.
///
/// Capacity adapts to the candidate pool size every time [`HistoryBuffer::can_add`] is
/// consulted; a capacity change clears the buffer, since an old limit's contents aren't
/// meaningful under a new one.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    entries: VecDeque<String>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        HistoryBuffer { entries: VecDeque::new(), capacity: 0 }
    }

    /// The capacity law from the data model: 1 if the pool has exactly one song; otherwise
    /// `ceil(pool/2)` under 5, else `min(ceil(pool*0.75), 200)`.
    pub fn capacity_for(pool_size: usize) -> usize {
        if pool_size == 1 {
            1
        } else if pool_size < 5 {
            pool_size.div_ceil(2)
        } else {
            ((pool_size * 3).div_ceil(4)).min(200)
        }
    }

    /// Whether `file` may be added given the current pool size. Recomputes capacity first; a
    /// change clears the buffer and returns `true` unconditionally, since rules effectively
    /// changed underneath the history.
    pub fn can_add(&mut self, file: &str, pool_size: usize) -> bool {
        if pool_size == 1 {
            return true;
        }

        let capacity = Self::capacity_for(pool_size);
        if capacity != self.capacity {
            trace!(old = self.capacity, new = capacity, "history capacity changed, clearing");
            self.capacity = capacity;
            self.entries.clear();
            return true;
        }

        !self.entries.iter().any(|e| e == file)
    }

    /// Records `file` as enqueued, evicting the oldest entry if at capacity.
    pub fn store_song(&mut self, file: &str) {
        if self.capacity == 0 {
            self.capacity = 5;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(file.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_law_matches_data_model() {
        assert_eq!(HistoryBuffer::capacity_for(1), 1);
        assert_eq!(HistoryBuffer::capacity_for(4), 2);
        assert_eq!(HistoryBuffer::capacity_for(5), 4);
        assert_eq!(HistoryBuffer::capacity_for(100), 75);
        assert_eq!(HistoryBuffer::capacity_for(1000), 200);
    }

    #[test]
    fn pool_of_one_always_allows() {
        let mut history = HistoryBuffer::new();
        assert!(history.can_add("a.mp3", 1));
        history.store_song("a.mp3");
        assert!(history.can_add("a.mp3", 1));
    }

    #[test]
    fn rejects_recently_stored_entry() {
        let mut history = HistoryBuffer::new();
        assert!(history.can_add("a.mp3", 10));
        history.store_song("a.mp3");
        assert!(!history.can_add("a.mp3", 10));
        assert!(history.can_add("b.mp3", 10));
    }

    #[test]
    fn capacity_change_clears_buffer() {
        let mut history = HistoryBuffer::new();
        history.can_add("a.mp3", 10);
        history.store_song("a.mp3");
        assert!(!history.can_add("a.mp3", 10));

        // Pool shrank, capacity changes from 8 to 2: buffer clears, stale entry forgiven.
        assert!(history.can_add("a.mp3", 4));
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut history = HistoryBuffer::new();
        history.can_add("seed", 4); // capacity = 2
        history.store_song("a");
        history.store_song("b");
        history.store_song("c");
        assert!(history.can_add("a", 4));
        assert!(!history.can_add("c", 4));
    }
}
