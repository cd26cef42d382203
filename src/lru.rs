//! Bounded map with least-recently-used eviction.
//!
//! Entries live in a dense slab and are threaded on a doubly linked list
//! ordered from least to most recently used. The hash map points into the
//! slab, so lookup, insert, touch and removal are all O(1). Removal moves the
//! last slab entry into the hole and patches its links.
//!
//! Plain reads ([`LruMap::get`], [`LruMap::get_mut`]) do not change recency.
//! Only inserts and [`LruMap::get_touch`] move an entry to the
//! most-recently-used end.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Capacity-bounded map that evicts its least-recently-used entry on overflow.
pub struct LruMap<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Node<K, V>>,
    /// Least recently used.
    head: Option<usize>,
    /// Most recently used.
    tail: Option<usize>,
    capacity: usize,
}

impl<K, V> LruMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty map holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            head: None,
            tail: None,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Look up an entry without changing its recency.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(&self.slots[slot].value)
    }

    /// Mutable lookup without changing recency.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(&mut self.slots[slot].value)
    }

    /// Look up an entry and mark it most recently used.
    pub fn get_touch<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.unlink(slot);
        self.push_back(slot);
        Some(&mut self.slots[slot].value)
    }

    /// Insert or replace an entry, marking it most recently used.
    ///
    /// Returns the entry evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot].value = value;
            self.unlink(slot);
            self.push_back(slot);
            return None;
        }
        let (_, evicted) = self.insert_new(key, value);
        evicted
    }

    /// Return the entry for `key`, inserting `make()` if absent.
    ///
    /// An existing entry keeps its recency. The returned flag is `true` when
    /// the entry was created; the last element is any entry evicted for it.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> (&mut V, bool, Option<(K, V)>)
    where
        F: FnOnce() -> V,
    {
        if let Some(&slot) = self.index.get(&key) {
            return (&mut self.slots[slot].value, false, None);
        }
        let (slot, evicted) = self.insert_new(key, make());
        (&mut self.slots[slot].value, true, evicted)
    }

    /// Insert every entry of `entries` in iteration order.
    pub fn update<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(self.remove_slot(slot).1)
    }

    /// Remove and return the least recently used entry.
    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let slot = self.head?;
        Some(self.remove_slot(slot))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.head = None;
        self.tail = None;
    }

    /// Entries from least to most recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: &self.slots,
            cursor: self.head,
            remaining: self.slots.len(),
        }
    }

    /// Alias of [`LruMap::iter`].
    pub fn items(&self) -> Iter<'_, K, V> {
        self.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    fn insert_new(&mut self, key: K, value: V) -> (usize, Option<(K, V)>) {
        let evicted = if self.slots.len() >= self.capacity {
            self.pop_front()
        } else {
            None
        };

        let slot = self.slots.len();
        self.slots.push(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.index.insert(key, slot);
        self.push_back(slot);

        (slot, evicted)
    }

    fn remove_slot(&mut self, slot: usize) -> (K, V) {
        self.unlink(slot);
        let node = self.slots.swap_remove(slot);
        self.index.remove(&node.key);

        // The former last node now lives at `slot`; repoint everything at it.
        if slot < self.slots.len() {
            let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
            match prev {
                Some(prev) => self.slots[prev].next = Some(slot),
                None => self.head = Some(slot),
            }
            match next {
                Some(next) => self.slots[next].prev = Some(slot),
                None => self.tail = Some(slot),
            }
            if let Some(index) = self.index.get_mut(&self.slots[slot].key) {
                *index = slot;
            }
        }

        (node.key, node.value)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }
        self.slots[slot].prev = None;
        self.slots[slot].next = None;
    }

    fn push_back(&mut self, slot: usize) {
        self.slots[slot].prev = self.tail;
        self.slots[slot].next = None;
        match self.tail {
            Some(tail) => self.slots[tail].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }
}

impl<K, V> fmt::Debug for LruMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over an [`LruMap`] from least to most recently used.
pub struct Iter<'a, K, V> {
    slots: &'a [Node<K, V>],
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.slots.get(self.cursor?)?;
        self.cursor = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> IntoIterator for &'a LruMap<K, V>
where
    K: Eq + Hash + Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
