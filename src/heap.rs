//! Size-capped, time-ordered index of task events.
//!
//! Most events arrive roughly in order, so insertion is usually a push onto
//! the back. Late events are placed with a binary search. When full, the
//! oldest entry is popped off the front, so a full heap stays O(1) per
//! in-order event.

use std::collections::vec_deque::{self, VecDeque};

use crate::clock::TimeTuple;

/// Sorted, bounded sequence of [`TimeTuple`]s.
#[derive(Debug, Clone)]
pub struct EventHeap {
    entries: VecDeque<TimeTuple>,
    capacity: usize,
}

impl EventHeap {
    /// Create an empty heap holding at most `capacity` tuples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a tuple, dropping the oldest entry first if the heap is full.
    pub fn insert(&mut self, tuple: TimeTuple) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }

        match self.entries.back() {
            Some(last) if tuple <= *last => {
                let at = self.entries.partition_point(|entry| *entry <= tuple);
                self.entries.insert(at, tuple);
            }
            _ => self.entries.push_back(tuple),
        }
    }

    /// Replace the contents with `tuples`, sorted ascending.
    ///
    /// If there are more tuples than fit, the newest are kept.
    pub fn rebuild<I>(&mut self, tuples: I)
    where
        I: IntoIterator<Item = TimeTuple>,
    {
        let mut entries: Vec<TimeTuple> = tuples.into_iter().collect();
        entries.sort();
        self.restore(entries);
    }

    /// Replace the contents with `tuples`, which must already be ascending.
    ///
    /// If there are more tuples than fit, the newest are kept.
    pub fn restore<I>(&mut self, tuples: I)
    where
        I: IntoIterator<Item = TimeTuple>,
    {
        self.entries = tuples.into_iter().collect();
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, TimeTuple> {
        self.entries.iter()
    }

    /// Newest first.
    pub fn iter_newest(&self) -> std::iter::Rev<vec_deque::Iter<'_, TimeTuple>> {
        self.entries.iter().rev()
    }
}
