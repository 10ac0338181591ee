//! Runtime choice of cache storage.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use super::memory::{MemoryStorage, TieredStorage};
use super::storage::{CacheStorage, CachedEntity, CachedQueryResult, NoopStorage, SqliteStorage};
use super::traits::Cacheable;

/// Storage selected from configuration.
pub enum CacheBackend {
  Disabled(NoopStorage),
  Durable(SqliteStorage),
  Tiered(TieredStorage<MemoryStorage, SqliteStorage>),
}

macro_rules! dispatch {
  ($self:ident, $s:ident => $call:expr) => {
    match $self {
      CacheBackend::Disabled($s) => $call,
      CacheBackend::Durable($s) => $call,
      CacheBackend::Tiered($s) => $call,
    }
  };
}

impl CacheStorage for CacheBackend {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
    cached_at: DateTime<Utc>,
  ) -> Result<()> {
    dispatch!(self, s => s.store_query_result(key, description, entities, cached_at))
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    dispatch!(self, s => s.get_query_result(key))
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    dispatch!(self, s => s.get_entity(entity_key))
  }

  fn store_entity<T: Cacheable>(&self, entity: &T, cached_at: DateTime<Utc>) -> Result<()> {
    dispatch!(self, s => s.store_entity(entity, cached_at))
  }

  fn clear(&self) -> Result<()> {
    dispatch!(self, s => s.clear())
  }
}
