//! Error types for the linkmap library.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (`check_invariants` methods).
//! - [`ConfigError`]: Returned when map configuration parameters are invalid
//!   (e.g. a non-positive load factor, a zero concurrency level).
//!
//! ## Example Usage
//!
//! ```
//! use linkmap::builder::LinkedMapBuilder;
//! use linkmap::error::ConfigError;
//! use linkmap::listener::PassthroughListener;
//!
//! // Fallible construction for user-configurable parameters
//! let map = LinkedMapBuilder::new(100)
//!     .concurrency_level(8)
//!     .build::<u64, String, _>(PassthroughListener);
//! assert!(map.is_ok());
//!
//! // Invalid load factor is caught without panicking
//! let bad = LinkedMapBuilder::new(100)
//!     .load_factor(-1.0)
//!     .build::<u64, String, _>(PassthroughListener);
//! assert!(bad.is_err());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal map invariants are violated.
///
/// Produced by `check_invariants` methods on
/// [`Segment`](crate::segment::Segment::check_invariants) and
/// [`ConcurrentLinkedMap`](crate::map::ConcurrentLinkedMap::check_invariants).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when map configuration parameters are invalid.
///
/// Produced by [`LinkedMapBuilder::build`](crate::builder::LinkedMapBuilder::build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use linkmap::builder::LinkedMapBuilder;
/// use linkmap::listener::PassthroughListener;
///
/// let err = LinkedMapBuilder::new(100)
///     .concurrency_level(0)
///     .build::<u64, u64, _>(PassthroughListener)
///     .unwrap_err();
/// assert!(err.to_string().contains("concurrency"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
