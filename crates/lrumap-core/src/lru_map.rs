//! Bounded, recency-ordered key-value map with LRU eviction.
//!
//! Entries live in a `Vec` arena and are chained into a doubly-linked list by
//! index. Slots `0` and `1` hold the head and tail sentinels: they never carry
//! an entry, are never counted, and are never freed, so linking and unlinking
//! never has to special-case the ends of the chain.
//!
//! Walking from `head.next` to the tail visits entries most-recently used
//! first. Every successful keyed access (`get`, `contains_key`,
//! `contains_value`, `put` on an existing key) relinks the entry right after
//! the head. Inserting a new key while full evicts the entry right before the
//! tail.
//!
//! A `HashMap<K, usize>` index maps keys to arena slots, so keyed operations
//! are O(1) on average. `contains_value` is a linear scan.
//!
//! # Example
//! ```
//! use lrumap_core::lru_map::LruMap;
//!
//! let mut map = LruMap::new(3).unwrap();
//! map.put("A", 1);
//! map.put("B", 2);
//! map.put("C", 3);
//!
//! assert_eq!(map.get(&"A"), Some(&1));
//! // order is now A, C, B; B is least-recently used
//!
//! map.put("D", 4); // evicts B
//! assert!(!map.contains_key(&"B"));
//! assert_eq!(map.to_string(), "[{3/3}{D : 4}, {A : 1}, {C : 3}]");
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::Result;
use crate::config::CacheConfig;

/// Arena slot of the head sentinel (before the MRU entry).
const HEAD: usize = 0;
/// Arena slot of the tail sentinel (after the LRU entry).
const TAIL: usize = 1;
/// End marker for the free list.
const NIL: usize = usize::MAX;
/// Upper bound on up-front allocation; larger maps grow on demand.
const PRESIZE_LIMIT: usize = 1024;

#[derive(Debug, Clone)]
struct Node<K, V> {
    /// `None` for sentinels and for slots parked on the free list.
    entry: Option<(K, V)>,
    prev: usize,
    next: usize,
}

impl<K, V> Node<K, V> {
    fn sentinel(prev: usize, next: usize) -> Self {
        Self {
            entry: None,
            prev,
            next,
        }
    }
}

/// Access counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Promoting lookups that found an entry.
    pub hits: u64,
    /// Promoting lookups that found nothing.
    pub misses: u64,
    /// Entries dropped to make room for a new key.
    pub evictions: u64,
    /// New keys stored.
    pub insertions: u64,
    /// Existing keys overwritten.
    pub updates: u64,
    /// Entries taken out through `remove`.
    pub removals: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in `[0.0, 1.0]`; `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Number of promoting lookups (hits + misses).
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Fixed-capacity map ordered by recency of use.
#[derive(Clone)]
pub struct LruMap<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    arena: Vec<Node<K, V>>,
    free_head: usize,
    stats: CacheStats,
}

impl<K, V> fmt::Debug for LruMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruMap")
            .field("capacity", &self.capacity)
            .field("len", &self.index.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty map holding at most `capacity` entries.
    ///
    /// Returns `Error::InvalidArgument` when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(crate::Error::InvalidArgument(
                "capacity must be greater than zero".to_string(),
            ));
        }
        let presize = capacity.min(PRESIZE_LIMIT);
        let mut arena = Vec::with_capacity(presize + 2);
        arena.push(Node::sentinel(NIL, TAIL));
        arena.push(Node::sentinel(HEAD, NIL));
        Ok(Self {
            capacity,
            index: HashMap::with_capacity(presize),
            arena,
            free_head: NIL,
            stats: CacheStats::default(),
        })
    }

    /// Create a map sized from the `[cache]` config section.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.capacity)
    }

    /// Maximum number of entries; fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no entries are live.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Lookup and mutation counters since construction or the last reset.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Zero every counter. Entries and their order are untouched.
    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    /// Report whether `key` is present, promoting it to most-recently used
    /// when it is.
    pub fn contains_key<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key).is_some()
    }

    /// Get the value for `key`, promoting the entry to most-recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.lookup(key)?;
        self.arena[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Mutable variant of [`get`](Self::get); also promotes.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.lookup(key)?;
        self.arena[idx].entry.as_mut().map(|(_, v)| v)
    }

    /// Read the value for `key` without touching recency order or stats.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &idx = self.index.get(key)?;
        self.arena[idx].entry.as_ref().map(|(_, v)| v)
    }

    /// Insert `value` under `key` and make it most-recently used.
    ///
    /// An existing key has its value replaced in place and the old value is
    /// returned; the size does not change. A new key arriving while the map
    /// is full first evicts the least-recently used entry.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.index.get(&key) {
            let previous = self.arena[idx]
                .entry
                .as_mut()
                .map(|(_, v)| std::mem::replace(v, value));
            self.promote(idx);
            self.stats.updates += 1;
            return previous;
        }

        if self.index.len() == self.capacity && self.evict_lru().is_some() {
            self.stats.evictions += 1;
        }

        let idx = self.alloc(key.clone(), value);
        self.link_after_head(idx);
        self.index.insert(key, idx);
        self.stats.insertions += 1;
        None
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        let (_, value) = self.release(idx)?;
        self.stats.removals += 1;
        Some(value)
    }

    /// `put` every pair in iteration order. A key repeated later in the
    /// sequence overwrites the earlier value and ends up more recent.
    pub fn put_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    /// Drop every entry; head and tail end up linked to each other.
    pub fn clear(&mut self) {
        self.index.clear();
        self.arena.truncate(2);
        self.arena[HEAD] = Node::sentinel(NIL, TAIL);
        self.arena[TAIL] = Node::sentinel(HEAD, NIL);
        self.free_head = NIL;
    }

    /// Most-recently used entry, without promoting it.
    pub fn peek_mru(&self) -> Option<(&K, &V)> {
        self.entry_at(self.arena[HEAD].next)
    }

    /// Least-recently used entry, without promoting it.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.entry_at(self.arena[TAIL].prev)
    }

    /// Remove and return the least-recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        self.evict_lru()
    }

    /// Entries from most-recently used to least-recently used.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            arena: &self.arena,
            front: self.arena[HEAD].next,
            back: self.arena[TAIL].prev,
            remaining: self.index.len(),
        }
    }

    /// Keys from most-recently used to least-recently used.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Values in the same order as [`keys`](Self::keys).
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Entries from least-recently used to most-recently used.
    ///
    /// This is the replay order: feeding it through [`put_all`](Self::put_all)
    /// into an empty map of the same capacity reproduces this map's recency
    /// order, because each `put` lands in the MRU slot.
    pub fn entries(&self) -> std::iter::Rev<Iter<'_, K, V>> {
        self.iter().rev()
    }

    // --- chain internals ---

    /// Index lookup that promotes on a hit and counts the outcome.
    fn lookup<Q>(&mut self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.promote(idx);
                self.stats.hits += 1;
                Some(idx)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    fn entry_at(&self, idx: usize) -> Option<(&K, &V)> {
        self.arena[idx].entry.as_ref().map(|(k, v)| (k, v))
    }

    /// Place a new entry in a recycled slot if one is free.
    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            entry: Some((key, value)),
            prev: NIL,
            next: NIL,
        };
        if self.free_head == NIL {
            self.arena.push(node);
            self.arena.len() - 1
        } else {
            let idx = self.free_head;
            self.free_head = self.arena[idx].next;
            self.arena[idx] = node;
            idx
        }
    }

    /// Take the entry out of an already-unlinked slot and park the slot on
    /// the free list.
    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        debug_assert!(idx > TAIL, "sentinel slots are never released");
        let entry = self.arena[idx].entry.take();
        self.arena[idx].prev = NIL;
        self.arena[idx].next = self.free_head;
        self.free_head = idx;
        entry
    }

    /// (head) <-> (a)  becomes  (head) <-> (idx) <-> (a)
    fn link_after_head(&mut self, idx: usize) {
        let first = self.arena[HEAD].next;
        self.arena[idx].prev = HEAD;
        self.arena[idx].next = first;
        self.arena[first].prev = idx;
        self.arena[HEAD].next = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let Node { prev, next, .. } = self.arena[idx];
        self.arena[prev].next = next;
        self.arena[next].prev = prev;
        self.arena[idx].prev = NIL;
        self.arena[idx].next = NIL;
    }

    fn promote(&mut self, idx: usize) {
        if self.arena[HEAD].next == idx {
            return;
        }
        self.unlink(idx);
        self.link_after_head(idx);
    }

    fn evict_lru(&mut self) -> Option<(K, V)> {
        let idx = self.arena[TAIL].prev;
        if idx == HEAD {
            return None;
        }
        self.unlink(idx);
        let (key, value) = self.release(idx)?;
        self.index.remove(&key);
        Some((key, value))
    }
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone,
    V: PartialEq,
{
    /// Report whether any entry holds `value`, promoting the most-recently
    /// used match.
    ///
    /// Comparison is `PartialEq`; with `V = Option<T>`, passing `&None`
    /// matches entries that hold no value.
    pub fn contains_value(&mut self, value: &V) -> bool {
        let mut idx = self.arena[HEAD].next;
        while idx != TAIL {
            let matched = self.arena[idx]
                .entry
                .as_ref()
                .is_some_and(|(_, v)| v == value);
            if matched {
                self.promote(idx);
                self.stats.hits += 1;
                return true;
            }
            idx = self.arena[idx].next;
        }
        self.stats.misses += 1;
        false
    }
}

impl<K, V> Extend<(K, V)> for LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter);
    }
}

impl<'a, K, V> IntoIterator for &'a LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone + fmt::Display,
{
    fn render<F>(&self, f: &mut fmt::Formatter<'_>, value: F) -> fmt::Result
    where
        F: Fn(&V, &mut fmt::Formatter<'_>) -> fmt::Result,
    {
        write!(f, "[{{{}/{}}}", self.len(), self.capacity)?;
        for (i, (key, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{{{key} : ")?;
            value(v, f)?;
            f.write_str("}")?;
        }
        f.write_str("]")
    }
}

/// `[{len/capacity}{k : v}, {k : v}]`, most-recently used first.
impl<K, V> fmt::Display for LruMap<K, V>
where
    K: Hash + Eq + Clone + fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, |value, f| fmt::Display::fmt(value, f))
    }
}

impl<K, T> LruMap<K, Option<T>>
where
    K: Hash + Eq + Clone,
{
    /// Render a map of nullable values, absent ones as `null`.
    ///
    /// `Option<T>` has no `Display` impl, so this adapter stands in for
    /// `to_string()`.
    #[must_use]
    pub fn display_nullable(&self) -> DisplayNullable<'_, K, T> {
        DisplayNullable(self)
    }
}

/// Returned by [`LruMap::display_nullable`].
pub struct DisplayNullable<'a, K, T>(&'a LruMap<K, Option<T>>);

impl<K, T> fmt::Display for DisplayNullable<'_, K, T>
where
    K: Hash + Eq + Clone + fmt::Display,
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.render(f, |value, f| match value {
            Some(v) => fmt::Display::fmt(v, f),
            None => f.write_str("null"),
        })
    }
}

/// Double-ended iterator over the chain; forward is MRU → LRU.
pub struct Iter<'a, K, V> {
    arena: &'a [Node<K, V>],
    front: usize,
    back: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.arena[self.front];
        self.front = node.next;
        self.remaining -= 1;
        node.entry.as_ref().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = &self.arena[self.back];
        self.back = node.prev;
        self.remaining -= 1;
        node.entry.as_ref().map(|(k, v)| (k, v))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Keys in MRU → LRU order, from [`LruMap::keys`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// Values in MRU → LRU order, from [`LruMap::values`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
