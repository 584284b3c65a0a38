//! Bounded, ordered key→value segment with listener-gated eviction.
//!
//! A [`Segment`] is one independently-locked shard of a
//! [`ConcurrentLinkedMap`](crate::map::ConcurrentLinkedMap). It combines a
//! hash index with an intrusive doubly-linked recency list so that lookups,
//! inserts, removals, eviction-candidate selection and relink-on-access are
//! all O(1).
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────────┐
//!   │                        Segment<K, V, L>                           │
//!   │                                                                   │
//!   │   ┌─────────────────────────────────────────────────────────┐     │
//!   │   │  FxHashMap<K, NonNull<Node>>  (index)                   │     │
//!   │   │                                                         │     │
//!   │   │  ┌─────────┬──────────────────────────────────────┐     │     │
//!   │   │  │   Key   │  node ptr                            │     │     │
//!   │   │  ├─────────┼──────────────────────────────────────┤     │     │
//!   │   │  │    A    │  ────────────────────────────────┐   │     │     │
//!   │   │  │    B    │  ────────────────────────┐       │   │     │     │
//!   │   │  └─────────┴──────────────────────────┼───────┼───┘     │     │
//!   │   └──────────────────────────────────────┼───────┼─────────┘     │
//!   │                                           ▼       ▼               │
//!   │   head ──► ┌──────────┐ ◄────────► ┌──────────┐ ◄── tail          │
//!   │  (most     │ Node B   │            │ Node A   │   (least          │
//!   │   recent)  │ key,     │            │ key,     │    recent =       │
//!   │            │ Arc<V>   │            │ Arc<V>   │    eviction       │
//!   │            └──────────┘            └──────────┘    candidate)     │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering modes
//!
//! | Mode                   | `get`            | overwrite `insert`  | new `insert` |
//! |------------------------|------------------|---------------------|--------------|
//! | [`OrderMode::Insertion`] | no relink      | no relink           | to head      |
//! | [`OrderMode::Access`]    | relink to head | relink to head      | to head      |
//!
//! The eviction candidate is always the tail: the least-recently-inserted
//! entry in insertion mode, the least-recently-touched one in access mode.
//!
//! ## Eviction protocol
//!
//! An insert that grows the segment past `max_entries` offers the tail entry
//! to the listener's [`on_evict`](crate::listener::MapEventListener::on_evict)
//! hook. `true` removes the candidate; `false` retains it, leaving the
//! segment over capacity until entries leave through other means. Exactly
//! one candidate is offered per overflowing insert; a vetoed backlog is
//! never drained in a batch. Overwrites do not grow the segment and never
//! trigger the hook. [`clear`](Segment::clear) drops everything without any
//! listener invocation.
//!
//! ## Thread safety
//!
//! A `Segment` performs **no locking of its own**. Every method assumes the
//! caller holds the owning lock; the concurrent wrapper lives in
//! [`map`](crate::map). Sharing a bare `Segment` across threads without
//! external synchronization is prevented by the `&mut` receivers.

use std::fmt;
use std::hash::Hash;
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::InvariantError;
use crate::listener::MapEventListener;
#[cfg(feature = "metrics")]
use crate::metrics::{MetricsSnapshot, SegmentMetrics};

/// Eviction-order policy of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    /// Eviction order is arrival order. Lookups and overwrites leave the
    /// order untouched.
    Insertion,
    /// Eviction order is recency of last read or write. Lookups and
    /// overwrites move the entry to the most-recent end.
    Access,
}

/// Node in the recency list.
///
/// List pointers first for locality; the key is needed for index removal
/// during eviction.
#[repr(C)]
struct Node<K, V> {
    prev: Option<NonNull<Node<K, V>>>,
    next: Option<NonNull<Node<K, V>>>,
    key: K,
    value: Arc<V>,
}

/// A bounded ordered key→value container with listener-gated eviction.
///
/// Values are stored as `Arc<V>` so lookups and removals hand out shared
/// handles without cloning `V`. Keys are owned twice (index and node), hence
/// the `K: Clone` bound.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use linkmap::listener::PassthroughListener;
/// use linkmap::segment::{OrderMode, Segment};
///
/// let mut segment = Segment::new(16, OrderMode::Access, 2, Arc::new(PassthroughListener));
/// segment.insert(1u64, Arc::new("a"));
/// segment.insert(2, Arc::new("b"));
///
/// // Touch 1, then overflow: 2 is now the least-recent entry and is evicted.
/// segment.get(&1);
/// segment.insert(3, Arc::new("c"));
/// assert!(segment.contains_key(&1));
/// assert!(!segment.contains_key(&2));
/// assert!(segment.contains_key(&3));
/// ```
pub struct Segment<K, V, L> {
    map: FxHashMap<K, NonNull<Node<K, V>>>,
    /// Most-recent end of the list.
    head: Option<NonNull<Node<K, V>>>,
    /// Least-recent end of the list; the eviction candidate.
    tail: Option<NonNull<Node<K, V>>>,
    order: OrderMode,
    max_entries: usize,
    listener: Arc<L>,
    #[cfg(feature = "metrics")]
    metrics: SegmentMetrics,
}

// SAFETY: the raw node pointers only reference heap memory owned by this
// segment, so Send/Sync reduce to the constituents. `Arc<V>` needs
// `V: Send + Sync` to cross threads; the listener is shared via `Arc<L>`.
unsafe impl<K, V, L> Send for Segment<K, V, L>
where
    K: Send,
    V: Send + Sync,
    L: Send + Sync,
{
}

// SAFETY: all mutation goes through `&mut self`; shared references expose
// only reads of memory owned by the segment.
unsafe impl<K, V, L> Sync for Segment<K, V, L>
where
    K: Sync,
    V: Send + Sync,
    L: Send + Sync,
{
}

impl<K, V, L> Segment<K, V, L>
where
    K: Eq + Hash + Clone,
    L: MapEventListener<K, V>,
{
    /// Creates a segment.
    ///
    /// `initial_capacity` pre-sizes the hash index; `max_entries` is the
    /// entry count past which inserts offer the least-recent entry to the
    /// listener. A `max_entries` of zero means every newly inserted entry is
    /// itself immediately offered for eviction.
    pub fn new(
        initial_capacity: usize,
        order: OrderMode,
        max_entries: usize,
        listener: Arc<L>,
    ) -> Self {
        Segment {
            map: FxHashMap::with_capacity_and_hasher(initial_capacity, Default::default()),
            head: None,
            tail: None,
            order,
            max_entries,
            listener,
            #[cfg(feature = "metrics")]
            metrics: SegmentMetrics::default(),
        }
    }

    /// Looks up a key, relinking the entry to the most-recent end in
    /// [`OrderMode::Access`]. No capacity check is performed.
    #[inline]
    pub fn get(&mut self, key: &K) -> Option<Arc<V>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_get_call();

        let node_ptr = match self.map.get(key) {
            Some(&ptr) => ptr,
            None => {
                #[cfg(feature = "metrics")]
                self.metrics.record_get_miss();
                return None;
            },
        };

        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();

        if self.order == OrderMode::Access {
            self.detach(node_ptr);
            self.attach_front(node_ptr);
            self.validate();
        }

        unsafe { Some(Arc::clone(&(*node_ptr.as_ptr()).value)) }
    }

    /// Inserts or overwrites, returning the previous value on overwrite.
    ///
    /// Overwrites refresh recency in [`OrderMode::Access`] and never trigger
    /// eviction. A size-growing insert that pushes the segment past
    /// `max_entries` offers the single least-recent entry to the listener's
    /// `on_evict` hook while the caller's lock is held; a veto leaves the
    /// segment over capacity.
    pub fn insert(&mut self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_insert_call();

        if let Some(&node_ptr) = self.map.get(&key) {
            #[cfg(feature = "metrics")]
            self.metrics.record_insert_update();

            let previous = unsafe { mem::replace(&mut (*node_ptr.as_ptr()).value, value) };
            if self.order == OrderMode::Access {
                self.detach(node_ptr);
                self.attach_front(node_ptr);
            }
            self.validate();
            return Some(previous);
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_insert_new();

        let node = Box::new(Node {
            prev: None,
            next: None,
            key: key.clone(),
            value,
        });
        let node_ptr = NonNull::from(Box::leak(node));
        self.map.insert(key, node_ptr);
        self.attach_front(node_ptr);

        if self.map.len() > self.max_entries {
            self.offer_eldest();
        }

        self.validate();
        None
    }

    /// Deletes a key, returning the prior value if it was present.
    #[inline]
    pub fn remove(&mut self, key: &K) -> Option<Arc<V>> {
        #[cfg(feature = "metrics")]
        self.metrics.record_remove_call();

        let node_ptr = self.map.remove(key)?;

        #[cfg(feature = "metrics")]
        self.metrics.record_remove_found();

        self.detach(node_ptr);
        let node = unsafe { Box::from_raw(node_ptr.as_ptr()) };
        self.validate();
        Some(node.value)
    }

    /// Removes all entries. The listener is never invoked: bulk reset is not
    /// aging-out and not a single-key removal.
    pub fn clear(&mut self) {
        #[cfg(feature = "metrics")]
        self.metrics.record_clear();

        while self.pop_tail().is_some() {}
        self.map.clear();
        self.validate();
    }

    /// Returns whether a key is present, without touching order and without
    /// invoking the listener.
    ///
    /// This is a direct index probe. The top-level map's
    /// [`contains_key`](crate::map::ConcurrentLinkedMap::contains_key)
    /// deliberately does *not* use it; containment there routes through the
    /// `on_get` transform.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Returns whether any entry's value equals `value`. Read-only; no
    /// recency update.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.map
            .values()
            .any(|&ptr| unsafe { (*ptr.as_ptr()).value.as_ref() == value })
    }

    /// Current number of entries. May exceed `max_entries` after a vetoed
    /// eviction.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the segment holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The configured maximum entry count.
    #[inline]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// The configured ordering mode.
    #[inline]
    pub fn order(&self) -> OrderMode {
        self.order
    }

    /// Peeks at the current eviction candidate without touching order.
    #[inline]
    pub fn peek_eldest(&self) -> Option<(&K, &Arc<V>)> {
        self.tail.map(|tail_ptr| unsafe {
            let node = tail_ptr.as_ref();
            (&node.key, &node.value)
        })
    }

    /// Snapshot of the keys, least-recent first.
    pub fn keys(&self) -> Vec<K> {
        let mut out = Vec::with_capacity(self.map.len());
        let mut current = self.tail;
        while let Some(ptr) = current {
            let node = unsafe { ptr.as_ref() };
            out.push(node.key.clone());
            current = node.prev;
        }
        out
    }

    /// Snapshot of the values, least-recent first.
    pub fn values(&self) -> Vec<Arc<V>> {
        let mut out = Vec::with_capacity(self.map.len());
        let mut current = self.tail;
        while let Some(ptr) = current {
            let node = unsafe { ptr.as_ref() };
            out.push(Arc::clone(&node.value));
            current = node.prev;
        }
        out
    }

    /// Snapshot of the entries, least-recent first.
    pub fn entries(&self) -> Vec<(K, Arc<V>)> {
        let mut out = Vec::with_capacity(self.map.len());
        let mut current = self.tail;
        while let Some(ptr) = current {
            let node = unsafe { ptr.as_ref() };
            out.push((node.key.clone(), Arc::clone(&node.value)));
            current = node.prev;
        }
        out
    }

    /// Verifies index/list agreement: every listed node is indexed, the list
    /// is cycle-free, both structures agree on length and the tail
    /// terminates the list.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.map.is_empty() {
            if self.head.is_some() || self.tail.is_some() {
                return Err(InvariantError::new("empty index with non-empty list"));
            }
            return Ok(());
        }

        let mut count = 0usize;
        let mut last = None;
        let mut current = self.head;
        while let Some(ptr) = current {
            count += 1;
            if count > self.map.len() {
                return Err(InvariantError::new("cycle detected in recency list"));
            }
            let node = unsafe { ptr.as_ref() };
            match self.map.get(&node.key) {
                Some(&indexed) if indexed == ptr => {},
                Some(_) => {
                    return Err(InvariantError::new(
                        "index points at a different node for a listed key",
                    ));
                },
                None => return Err(InvariantError::new("listed key missing from index")),
            }
            last = Some(ptr);
            current = node.next;
        }

        if count != self.map.len() {
            return Err(InvariantError::new(format!(
                "recency list holds {} nodes but index holds {}",
                count,
                self.map.len()
            )));
        }
        if last != self.tail {
            return Err(InvariantError::new("tail does not terminate the recency list"));
        }
        Ok(())
    }

    /// Offers the tail entry to the listener. Called once per overflowing
    /// insert; never loops over a vetoed backlog.
    fn offer_eldest(&mut self) {
        let Some(tail_ptr) = self.tail else {
            return;
        };

        #[cfg(feature = "metrics")]
        self.metrics.record_evict_offer();

        let confirmed = {
            let node = unsafe { tail_ptr.as_ref() };
            self.listener.on_evict(&node.key, &node.value)
        };

        if confirmed {
            if let Some(node) = self.pop_tail() {
                self.map.remove(&node.key);
                #[cfg(feature = "metrics")]
                self.metrics.record_eviction();
            }
        } else {
            #[cfg(feature = "metrics")]
            self.metrics.record_eviction_veto();
        }
    }

    /// Detach a node from the list without removing it from the index.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the most-recent end.
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Pop the tail node (least recent) and return it.
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<K, V>>> {
        self.tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }

            node
        })
    }

    #[inline]
    fn validate(&self) {
        #[cfg(debug_assertions)]
        if let Err(err) = self.check_invariants() {
            panic!("segment invariant violated: {err}");
        }
    }
}

#[cfg(feature = "metrics")]
impl<K, V, L> Segment<K, V, L>
where
    K: Eq + Hash + Clone,
    L: MapEventListener<K, V>,
{
    /// Snapshot of this segment's operation counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.map.len())
    }
}

impl<K, V, L> Drop for Segment<K, V, L> {
    fn drop(&mut self) {
        // Free all nodes by unlinking from the tail.
        let mut current = self.tail;
        while let Some(ptr) = current {
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            current = node.prev;
        }
        self.head = None;
        self.tail = None;
    }
}

impl<K, V, L> fmt::Debug for Segment<K, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("len", &self.map.len())
            .field("max_entries", &self.max_entries)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}
