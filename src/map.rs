//! Top-level segmented concurrent map.
//!
//! [`ConcurrentLinkedMap`] presents a single-map contract backed by N
//! independently-locked [`Segment`]s. The segment count is the requested
//! concurrency level rounded up to a power of two; each key is routed by the
//! high bits of its spread hash.
//!
//! ## Architecture
//!
//! ```text
//!   get(k) / put(k, v) / remove(k)
//!        │
//!        ▼
//!   spread(fold(FxHash(k)))             high bits ──► segment index
//!        │
//!        ▼
//!   ┌─────────────┬─────────────┬─────────────┬─────────────┐
//!   │ Mutex<Seg0> │ Mutex<Seg1> │ Mutex<Seg2> │ Mutex<Seg3> │   ...
//!   └─────────────┴─────────────┴─────────────┴─────────────┘
//!        │  lock exactly one segment
//!        ▼
//!   ordered container op  ──►  listener hook (lock still held)  ──►  result
//! ```
//!
//! ## Consistency model
//!
//! Single-key operations are linearizable per segment: two operations on the
//! same segment serialize on its `Mutex`, two operations on different
//! segments proceed fully in parallel with no ordering between them.
//!
//! Aggregate operations ([`len`](ConcurrentLinkedMap::len),
//! [`is_empty`](ConcurrentLinkedMap::is_empty),
//! [`contains_value`](ConcurrentLinkedMap::contains_value),
//! [`keys`](ConcurrentLinkedMap::keys) and friends) visit segments
//! sequentially, acquiring one lock at a time, and therefore observe the map
//! at slightly different instants per segment. The result is **not** an
//! atomic snapshot and `len` is explicitly approximate under concurrent
//! mutation. This is the deliberate trade: no global lock, ever. The router
//! never holds two segment locks simultaneously, which is also what makes it
//! deadlock-free by construction.
//!
//! ## Listener interaction
//!
//! Every hook runs while the calling segment's lock is held. Hooks must not
//! re-enter the map; see [`listener`](crate::listener) for the full
//! contract.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::builder::LinkedMapBuilder;
use crate::error::InvariantError;
use crate::listener::{MapEventListener, PassthroughListener};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsSnapshot;
use crate::segment::{OrderMode, Segment};
use crate::spread::{hash_of, spread};

/// Upper bound on the segment count, matching the largest table the 32-bit
/// spread hash can index through its high bits without degenerating.
const MAX_SEGMENTS: usize = 1 << 16;

/// A bounded, thread-safe, order-preserving map with listener-gated
/// eviction.
///
/// Values are shared as `Arc<V>`; see [`put`](Self::put) /
/// [`put_arc`](Self::put_arc). The listener type defaults to
/// [`PassthroughListener`], the identity implementation.
///
/// # Example
///
/// ```
/// use linkmap::listener::PassthroughListener;
/// use linkmap::map::ConcurrentLinkedMap;
///
/// let map: ConcurrentLinkedMap<u64, String> = ConcurrentLinkedMap::new(100, PassthroughListener);
///
/// assert!(map.put(1, "one".to_string()).is_none());
/// assert_eq!(*map.get(&1).unwrap(), "one");
/// assert!(map.contains_key(&1));
///
/// let removed = map.remove(&1);
/// assert_eq!(*removed.unwrap(), "one");
/// assert!(map.is_empty());
/// ```
pub struct ConcurrentLinkedMap<K, V, L = PassthroughListener> {
    segments: Box<[Mutex<Segment<K, V, L>>]>,
    /// Shift applied to the spread hash before masking; uses `>>>`-style
    /// wrapping shift semantics so a single-segment map shifts by zero.
    segment_shift: u32,
    segment_mask: u32,
    concurrency_level: usize,
    max_entries: usize,
    segment_max_entries: usize,
    listener: Arc<L>,
}

impl<K, V, L> ConcurrentLinkedMap<K, V, L>
where
    K: Eq + Hash + Clone,
    L: MapEventListener<K, V>,
{
    /// Creates a map with the default configuration: initial capacity 16,
    /// load factor 0.75, insertion order, concurrency level 16.
    ///
    /// `max_entries` bounds the whole map approximately: it is split into
    /// `max(1, max_entries / segment_count)` per segment, so the effective
    /// total depends on how evenly keys spread across segments.
    pub fn new(max_entries: usize, listener: L) -> Self {
        Self::with_config(&LinkedMapBuilder::new(max_entries), listener)
    }

    pub(crate) fn with_config(config: &LinkedMapBuilder, listener: L) -> Self {
        // Find a power of two >= the requested concurrency level.
        let requested = config.concurrency_level.clamp(1, MAX_SEGMENTS);
        let mut level = 1usize;
        let mut sshift = 0u32;
        while level < requested {
            level <<= 1;
            sshift += 1;
        }
        let segment_shift = 32 - sshift;
        let segment_mask = (level - 1) as u32;

        let segment_max_entries = if config.max_entries <= level {
            1
        } else {
            config.max_entries / level
        };

        let listener = Arc::new(listener);
        let segments: Vec<Mutex<Segment<K, V, L>>> = (0..level)
            .map(|_| {
                Mutex::new(Segment::new(
                    config.initial_capacity,
                    config.order,
                    segment_max_entries,
                    Arc::clone(&listener),
                ))
            })
            .collect();

        ConcurrentLinkedMap {
            segments: segments.into_boxed_slice(),
            segment_shift,
            segment_mask,
            concurrency_level: level,
            max_entries: config.max_entries,
            segment_max_entries,
            listener,
        }
    }

    /// Looks up a key. In access-order mode the hit is also refreshed as
    /// most recent.
    ///
    /// The listener's `on_get` hook fires on every call, misses included,
    /// and its return value *is* the result: an identity listener yields
    /// the stored value, a transforming one may substitute or synthesize.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut segment = self.segment_for(key).lock();
        let found = segment.get(key);
        self.listener.on_get(key, found)
    }

    /// Inserts or overwrites, wrapping the value in `Arc` internally.
    ///
    /// Returns the listener's `on_put` transform of the previous value; an
    /// identity listener yields the previous value itself. An insert that
    /// pushes the target segment over capacity offers that segment's
    /// least-recent entry to `on_evict` before this method returns.
    pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
        self.put_arc(key, Arc::new(value))
    }

    /// Inserts a pre-wrapped `Arc<V>` directly, without re-wrapping.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use linkmap::listener::PassthroughListener;
    /// use linkmap::map::ConcurrentLinkedMap;
    ///
    /// let map: ConcurrentLinkedMap<u64, String> = ConcurrentLinkedMap::new(10, PassthroughListener);
    /// let shared = Arc::new("shared".to_string());
    /// map.put_arc(1, Arc::clone(&shared));
    /// assert!(Arc::ptr_eq(&map.get(&1).unwrap(), &shared));
    /// ```
    pub fn put_arc(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        let mut segment = self.segment_for(&key).lock();
        let previous = segment.insert(key.clone(), Arc::clone(&value));
        self.listener.on_put(&key, &value, previous)
    }

    /// Removes a key.
    ///
    /// The listener's `on_remove` hook fires even when nothing was removed;
    /// its return value becomes the result.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let mut segment = self.segment_for(key).lock();
        let removed = segment.remove(key);
        self.listener.on_remove(key, removed)
    }

    /// Applies [`put`](Self::put) once per pair. No atomicity across
    /// entries: a concurrent reader may observe any prefix.
    pub fn put_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    /// Clears every segment, one lock at a time, with **zero** listener
    /// invocations. Bulk reset is not aging-out and not a single-key
    /// removal.
    pub fn clear(&self) {
        for segment in self.segments.iter() {
            segment.lock().clear();
        }
    }

    /// Whether `get(key)` yields a present value.
    ///
    /// Containment deliberately routes through the same `on_get` transform
    /// path as retrieval (and, in access-order mode, refreshes recency like
    /// any other lookup). Consequences, documented rather than
    /// special-cased: a listener that maps a stored value to `None` makes
    /// its key report as *not* contained, and a listener that fabricates
    /// values on misses makes never-inserted keys report as contained.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Whether any segment currently holds an entry equal to `value`.
    ///
    /// Segments are visited sequentially under their own locks; the answer
    /// is not an atomic snapshot. The listener is not consulted.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.segments
            .iter()
            .any(|segment| segment.lock().contains_value(value))
    }

    /// Total entry count, summed segment by segment.
    ///
    /// Approximate under concurrent mutation: segments not yet visited (or
    /// already visited) may change while others are being counted.
    pub fn len(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| segment.lock().len())
            .sum()
    }

    /// Whether every segment was empty at the instant it was visited.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|segment| segment.lock().is_empty())
    }

    /// Snapshot of all keys, concatenated segment by segment (least-recent
    /// first within each segment). Not atomic across segments.
    pub fn keys(&self) -> Vec<K> {
        let mut out = Vec::new();
        for segment in self.segments.iter() {
            out.extend(segment.lock().keys());
        }
        out
    }

    /// Snapshot of all values, concatenated segment by segment. Not atomic
    /// across segments.
    pub fn values(&self) -> Vec<Arc<V>> {
        let mut out = Vec::new();
        for segment in self.segments.iter() {
            out.extend(segment.lock().values());
        }
        out
    }

    /// Snapshot of all entries, concatenated segment by segment. Not atomic
    /// across segments.
    pub fn entries(&self) -> Vec<(K, Arc<V>)> {
        let mut out = Vec::new();
        for segment in self.segments.iter() {
            out.extend(segment.lock().entries());
        }
        out
    }

    /// The resolved segment count: the requested concurrency level rounded
    /// up to a power of two (minimum 1), fixed for the map's lifetime.
    #[inline]
    pub fn concurrency_level(&self) -> usize {
        self.concurrency_level
    }

    /// The shift applied to the spread hash when routing keys.
    #[inline]
    pub fn segment_shift(&self) -> u32 {
        self.segment_shift
    }

    /// The mask applied to the shifted spread hash when routing keys.
    #[inline]
    pub fn segment_mask(&self) -> u32 {
        self.segment_mask
    }

    /// The requested total entry bound, before per-segment splitting.
    #[inline]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// The per-segment entry bound: `max(1, max_entries / segment_count)`.
    #[inline]
    pub fn segment_max_entries(&self) -> usize {
        self.segment_max_entries
    }

    /// The segment index a key routes to. Deterministic for the map's
    /// lifetime; mainly useful for tests and diagnostics that need
    /// co-resident or disjoint keys.
    #[inline]
    pub fn segment_index(&self, key: &K) -> usize {
        let h = spread(hash_of(key));
        (h.wrapping_shr(self.segment_shift) & self.segment_mask) as usize
    }

    /// Runs [`Segment::check_invariants`] on every segment, one lock at a
    /// time.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        for (index, segment) in self.segments.iter().enumerate() {
            segment
                .lock()
                .check_invariants()
                .map_err(|err| InvariantError::new(format!("segment {index}: {err}")))?;
        }
        Ok(())
    }

    #[inline]
    fn segment_for(&self, key: &K) -> &Mutex<Segment<K, V, L>> {
        &self.segments[self.segment_index(key)]
    }
}

#[cfg(feature = "metrics")]
impl<K, V, L> ConcurrentLinkedMap<K, V, L>
where
    K: Eq + Hash + Clone,
    L: MapEventListener<K, V>,
{
    /// Aggregates every segment's operation counters. Counters are summed
    /// one segment lock at a time, so the snapshot carries the same
    /// approximate-aggregate caveat as [`len`](Self::len).
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let mut total = MetricsSnapshot::default();
        for segment in self.segments.iter() {
            total.merge(&segment.lock().metrics_snapshot());
        }
        total
    }
}

impl<K, V, L> fmt::Debug for ConcurrentLinkedMap<K, V, L>
where
    K: Eq + Hash + Clone,
    L: MapEventListener<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentLinkedMap")
            .field("len", &self.len())
            .field("max_entries", &self.max_entries)
            .field("concurrency_level", &self.concurrency_level)
            .finish_non_exhaustive()
    }
}
