// library entry
pub mod algorithms;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod limiter;
pub mod logging;
pub mod reorder;
pub mod storage;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use algorithms::{RateLimitAlgorithm, SlidingWindow, WindowState, WindowVerdict};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{KeyingBasis, LimiterConfig, MemoryStoreConfig, RateLimitPolicy, RateLimitWindow};
pub use error::{CoreError, Result, StorageError};
pub use http::{guard, HeaderSink, RateLimitHeaders, Rejection};
pub use identity::{Authenticator, Principal, RequestMeta};
pub use limiter::{Decision, RateLimiter};
pub use logging::init as init_logging;
pub use reorder::{OrderedEntity, OrderedListReorder};
pub use storage::{MemoryOrderStore, OrderStore, OrderTransaction, OrderedItem};
