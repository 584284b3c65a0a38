pub use crate::builder::LinkedMapBuilder;
pub use crate::error::{ConfigError, InvariantError};
pub use crate::listener::{MapEventListener, PassthroughListener};
pub use crate::map::ConcurrentLinkedMap;
pub use crate::segment::{OrderMode, Segment};

#[cfg(feature = "metrics")]
pub use crate::metrics::MetricsSnapshot;
