//! Builder for [`ConcurrentLinkedMap`](crate::map::ConcurrentLinkedMap).
//!
//! Validates user-configurable parameters up front and hands back a
//! [`ConfigError`] instead of panicking.
//!
//! ## Example
//!
//! ```
//! use linkmap::builder::LinkedMapBuilder;
//! use linkmap::listener::PassthroughListener;
//! use linkmap::segment::OrderMode;
//!
//! let map = LinkedMapBuilder::new(1_000)
//!     .order_mode(OrderMode::Access)
//!     .concurrency_level(8)
//!     .initial_capacity(64)
//!     .build::<u64, String, _>(PassthroughListener)
//!     .unwrap();
//!
//! assert_eq!(map.concurrency_level(), 8);
//! ```

use std::hash::Hash;

use crate::error::ConfigError;
use crate::listener::MapEventListener;
use crate::map::ConcurrentLinkedMap;
use crate::segment::OrderMode;

/// Default per-segment pre-size hint for the hash index.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Default load factor recorded when none is specified.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Default concurrency level, used when not otherwise specified.
pub const DEFAULT_CONCURRENCY_LEVEL: usize = 16;

/// Configures and constructs a [`ConcurrentLinkedMap`].
///
/// `max_entries` is the approximate total bound across all segments; the
/// remaining knobs default to initial capacity 16, load factor 0.75,
/// insertion order and concurrency level 16.
#[derive(Debug, Clone)]
pub struct LinkedMapBuilder {
    pub(crate) max_entries: usize,
    pub(crate) initial_capacity: usize,
    pub(crate) load_factor: f32,
    pub(crate) order: OrderMode,
    pub(crate) concurrency_level: usize,
}

impl LinkedMapBuilder {
    /// Starts a builder for a map bounded at approximately `max_entries`
    /// entries across all segments.
    pub fn new(max_entries: usize) -> Self {
        LinkedMapBuilder {
            max_entries,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            order: OrderMode::Insertion,
            concurrency_level: DEFAULT_CONCURRENCY_LEVEL,
        }
    }

    /// Pre-size hint for each segment's hash index.
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Growth threshold hint, validated and recorded. Rust hash tables
    /// manage their own resize policy, so this is advisory; it is kept for
    /// parity with the construction surface and must be finite and
    /// positive.
    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Eviction-order policy; defaults to [`OrderMode::Insertion`].
    pub fn order_mode(mut self, order: OrderMode) -> Self {
        self.order = order;
        self
    }

    /// Requested number of independently-locked segments, rounded up to the
    /// next power of two at build time. Must be at least 1.
    pub fn concurrency_level(mut self, concurrency_level: usize) -> Self {
        self.concurrency_level = concurrency_level;
        self
    }

    /// Validates the configuration and constructs the map with the given
    /// listener.
    pub fn build<K, V, L>(self, listener: L) -> Result<ConcurrentLinkedMap<K, V, L>, ConfigError>
    where
        K: Eq + Hash + Clone,
        L: MapEventListener<K, V>,
    {
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(ConfigError::new(format!(
                "load factor must be finite and positive, got {}",
                self.load_factor
            )));
        }
        if self.concurrency_level == 0 {
            return Err(ConfigError::new("concurrency level must be at least 1"));
        }
        Ok(ConcurrentLinkedMap::with_config(&self, listener))
    }
}
