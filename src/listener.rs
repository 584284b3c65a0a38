//! Map event listener: the capability set that observes and steers every
//! state transition of a [`ConcurrentLinkedMap`](crate::map::ConcurrentLinkedMap).
//!
//! A single listener instance is injected at construction and shared by all
//! segments. Each hook runs synchronously while the calling segment's lock is
//! held, which gives it two powers the usual fire-and-forget eviction
//! callback does not have:
//!
//! - **Transformation**: the return value of [`on_get`], [`on_put`] and
//!   [`on_remove`] *becomes* the result of the triggering operation. A
//!   listener can substitute values on the way out (lazy materialization,
//!   copy-on-read) or on the way in.
//! - **Veto**: [`on_evict`] decides whether the eviction candidate is
//!   actually removed. Returning `false` retains the entry and leaves the
//!   segment over its configured maximum.
//!
//! ## Contract
//!
//! ```text
//!   operation       hook                       hook return becomes
//!   ─────────       ────                       ───────────────────
//!   get(k)          on_get(k, found)           result of get
//!   put(k, v)       on_put(k, v, previous)     result of put
//!   remove(k)       on_remove(k, removed)      result of remove
//!   overflow insert on_evict(k, v) -> bool     true = evict, false = retain
//!   clear()         (none; bulk reset is silent)
//! ```
//!
//! Hooks fire on misses too: `on_get` receives `None` when the key is
//! absent, and `on_remove` receives `None` for a no-op removal. Absence is
//! an argument, not a skipped call.
//!
//! ## Rules for implementors
//!
//! - Hooks must be fast. They run under the owning segment's lock, so a slow
//!   hook stalls every operation routed to that segment (and only that
//!   segment).
//! - Hooks must not call back into the same map. The segment lock is already
//!   held; re-entry for the same or a different segment is undefined
//!   behavior and can deadlock.
//! - Different segments invoke the listener in parallel with no
//!   synchronization beyond each caller's own segment lock. Any state the
//!   listener holds must handle that (atomics, a mutex of its own).
//! - A panicking hook unwinds through the triggering operation. Container
//!   mutations already applied (e.g. an insert preceding a panicking
//!   `on_put`) are not rolled back.
//!
//! [`on_get`]: MapEventListener::on_get
//! [`on_put`]: MapEventListener::on_put
//! [`on_remove`]: MapEventListener::on_remove
//! [`on_evict`]: MapEventListener::on_evict

use std::sync::Arc;

/// Observes and steers every get, put, remove and eviction of a map.
///
/// See the [module documentation](self) for the full contract.
///
/// # Example
///
/// Counting evictions while letting them all proceed:
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use linkmap::listener::MapEventListener;
///
/// #[derive(Default)]
/// struct EvictionCounter {
///     evicted: AtomicUsize,
/// }
///
/// impl MapEventListener<u64, String> for EvictionCounter {
///     fn on_evict(&self, _key: &u64, _value: &Arc<String>) -> bool {
///         self.evicted.fetch_add(1, Ordering::Relaxed);
///         true
///     }
///
///     fn on_get(&self, _key: &u64, value: Option<Arc<String>>) -> Option<Arc<String>> {
///         value
///     }
///
///     fn on_put(
///         &self,
///         _key: &u64,
///         _value: &Arc<String>,
///         previous: Option<Arc<String>>,
///     ) -> Option<Arc<String>> {
///         previous
///     }
///
///     fn on_remove(&self, _key: &u64, removed: Option<Arc<String>>) -> Option<Arc<String>> {
///         removed
///     }
/// }
///
/// // One segment holding at most two entries: the third insert evicts.
/// let map = linkmap::builder::LinkedMapBuilder::new(2)
///     .concurrency_level(1)
///     .build::<u64, String, _>(EvictionCounter::default())
///     .unwrap();
///
/// map.put(1, "a".to_string());
/// map.put(2, "b".to_string());
/// map.put(3, "c".to_string());
/// assert_eq!(map.len(), 2);
/// ```
pub trait MapEventListener<K, V>: Send + Sync {
    /// Called when an insert has pushed a segment over its maximum entry
    /// count, with the least-recent entry as the candidate.
    ///
    /// Return `true` to confirm the eviction, `false` to veto it and leave
    /// the segment over capacity.
    fn on_evict(&self, key: &K, value: &Arc<V>) -> bool;

    /// Called on every lookup, with `None` when the key is absent.
    ///
    /// The return value becomes the result of the lookup, which also feeds
    /// [`contains_key`](crate::map::ConcurrentLinkedMap::contains_key).
    fn on_get(&self, key: &K, value: Option<Arc<V>>) -> Option<Arc<V>>;

    /// Called after every successful insert or overwrite with the stored
    /// value and the previous one, if any.
    ///
    /// The return value becomes the result of the put.
    fn on_put(&self, key: &K, value: &Arc<V>, previous: Option<Arc<V>>) -> Option<Arc<V>>;

    /// Called after every removal attempt, with `None` when nothing was
    /// removed.
    ///
    /// The return value becomes the result of the remove.
    fn on_remove(&self, key: &K, removed: Option<Arc<V>>) -> Option<Arc<V>>;
}

/// Sharing a listener with the caller: the map owns an `Arc` of it, the
/// caller keeps another handle to read whatever state it accumulates.
impl<K, V, T> MapEventListener<K, V> for Arc<T>
where
    T: MapEventListener<K, V> + ?Sized,
{
    #[inline]
    fn on_evict(&self, key: &K, value: &Arc<V>) -> bool {
        (**self).on_evict(key, value)
    }

    #[inline]
    fn on_get(&self, key: &K, value: Option<Arc<V>>) -> Option<Arc<V>> {
        (**self).on_get(key, value)
    }

    #[inline]
    fn on_put(&self, key: &K, value: &Arc<V>, previous: Option<Arc<V>>) -> Option<Arc<V>> {
        (**self).on_put(key, value, previous)
    }

    #[inline]
    fn on_remove(&self, key: &K, removed: Option<Arc<V>>) -> Option<Arc<V>> {
        (**self).on_remove(key, removed)
    }
}

/// The identity listener: confirms every eviction and passes every value
/// argument through unchanged.
///
/// Default listener of [`ConcurrentLinkedMap`](crate::map::ConcurrentLinkedMap),
/// and the baseline the crate's behavioral guarantees are stated against.
///
/// # Example
///
/// ```
/// use linkmap::listener::PassthroughListener;
/// use linkmap::map::ConcurrentLinkedMap;
///
/// let map: ConcurrentLinkedMap<u64, &str> = ConcurrentLinkedMap::new(100, PassthroughListener);
/// assert!(map.put(1, "one").is_none());
/// assert_eq!(*map.get(&1).unwrap(), "one");
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassthroughListener;

impl<K, V> MapEventListener<K, V> for PassthroughListener {
    #[inline]
    fn on_evict(&self, _key: &K, _value: &Arc<V>) -> bool {
        true
    }

    #[inline]
    fn on_get(&self, _key: &K, value: Option<Arc<V>>) -> Option<Arc<V>> {
        value
    }

    #[inline]
    fn on_put(&self, _key: &K, _value: &Arc<V>, previous: Option<Arc<V>>) -> Option<Arc<V>> {
        previous
    }

    #[inline]
    fn on_remove(&self, _key: &K, removed: Option<Arc<V>>) -> Option<Arc<V>> {
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_confirms_evictions() {
        let listener = PassthroughListener;
        assert!(MapEventListener::<u64, u64>::on_evict(
            &listener,
            &1,
            &Arc::new(10)
        ));
    }

    #[test]
    fn passthrough_returns_arguments_unchanged() {
        let listener = PassthroughListener;
        let value = Arc::new(10u64);

        let got = listener.on_get(&1u64, Some(Arc::clone(&value)));
        assert!(Arc::ptr_eq(got.as_ref().unwrap(), &value));

        assert!(listener.on_get(&1u64, None::<Arc<u64>>).is_none());
        assert!(listener.on_put(&1u64, &value, None).is_none());
        assert!(listener.on_remove(&1u64, None::<Arc<u64>>).is_none());

        let prev = Arc::new(5u64);
        let returned = listener.on_put(&1u64, &value, Some(Arc::clone(&prev)));
        assert!(Arc::ptr_eq(returned.as_ref().unwrap(), &prev));
    }

    #[test]
    fn listener_is_object_safe() {
        let listener: Box<dyn MapEventListener<u64, u64>> = Box::new(PassthroughListener);
        assert!(listener.on_get(&1, None).is_none());
    }
}
