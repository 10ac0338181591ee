//! Generic caching layer for remote lookups.
//!
//! This module provides a game-agnostic caching mechanism that:
//! - Caches entities by key and ordered query results by query hash
//! - Keeps a fast in-memory tier in front of a durable SQLite tier
//! - Refetches once an entry reaches its TTL
//! - Provides basic offline mode (serve stale cache when network unavailable)

mod backend;
mod layer;
mod memory;
mod storage;
mod traits;

pub use backend::CacheBackend;
pub use layer::CacheLayer;
pub use memory::{MemoryStorage, TieredStorage};
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, QueryKey};
