//! Caching primitives shared by the orchestration layer.

pub mod read_through;

pub use read_through::{CacheStats, ReadThroughCache};
