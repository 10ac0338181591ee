//! In-process cache tier and the two-tier composition.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::storage::{CacheStorage, CachedEntity, CachedQueryResult};
use super::traits::Cacheable;

#[derive(Debug, Clone)]
struct MemoryEntry {
  entity_type: &'static str,
  data: Value,
  cached_at: DateTime<Utc>,
}

/// Cache storage backed by process memory.
///
/// Entries are kept as JSON values so one map can hold every entity type.
#[derive(Default)]
pub struct MemoryStorage {
  queries: Mutex<HashMap<String, MemoryEntry>>,
  entities: Mutex<HashMap<(&'static str, String), MemoryEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T> {
  serde_json::from_value(value.clone()).map_err(|e| eyre!("Failed to decode cached value: {}", e))
}

impl CacheStorage for MemoryStorage {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    _description: &str,
    entities: &[T],
    cached_at: DateTime<Utc>,
  ) -> Result<()> {
    let data = serde_json::to_value(entities)
      .map_err(|e| eyre!("Failed to serialize query result: {}", e))?;
    self
      .queries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(
        key.to_string(),
        MemoryEntry {
          entity_type: T::entity_type(),
          data,
          cached_at,
        },
      );
    Ok(())
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    let queries = self.queries.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    match queries.get(key) {
      Some(entry) if entry.entity_type == T::entity_type() => Ok(Some(CachedQueryResult {
        entities: decode(&entry.data)?,
        cached_at: entry.cached_at,
      })),
      _ => Ok(None),
    }
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    let entities = self
      .entities
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    match entities.get(&(T::entity_type(), entity_key.to_string())) {
      Some(entry) => Ok(Some(CachedEntity {
        entity: decode(&entry.data)?,
        cached_at: entry.cached_at,
      })),
      None => Ok(None),
    }
  }

  fn store_entity<T: Cacheable>(&self, entity: &T, cached_at: DateTime<Utc>) -> Result<()> {
    let data =
      serde_json::to_value(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
    self
      .entities
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(
        (T::entity_type(), entity.cache_key()),
        MemoryEntry {
          entity_type: T::entity_type(),
          data,
          cached_at,
        },
      );
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    self
      .queries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    self
      .entities
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    Ok(())
  }
}

/// Two cache tiers: a fast one consulted first and a durable one behind it.
///
/// Reads fall through to the durable tier and promote hits into the fast tier
/// with their original `cached_at`. Writes go to both.
pub struct TieredStorage<F: CacheStorage, D: CacheStorage> {
  fast: F,
  durable: D,
}

impl<F: CacheStorage, D: CacheStorage> TieredStorage<F, D> {
  pub fn new(fast: F, durable: D) -> Self {
    Self { fast, durable }
  }
}

impl<F: CacheStorage, D: CacheStorage> CacheStorage for TieredStorage<F, D> {
  fn store_query_result<T: Cacheable>(
    &self,
    key: &str,
    description: &str,
    entities: &[T],
    cached_at: DateTime<Utc>,
  ) -> Result<()> {
    self
      .durable
      .store_query_result(key, description, entities, cached_at)?;
    self
      .fast
      .store_query_result(key, description, entities, cached_at)
  }

  fn get_query_result<T: Cacheable>(&self, key: &str) -> Result<Option<CachedQueryResult<T>>> {
    if let Some(hit) = self.fast.get_query_result(key)? {
      return Ok(Some(hit));
    }

    let hit = self.durable.get_query_result::<T>(key)?;
    if let Some(ref cached) = hit {
      self
        .fast
        .store_query_result(key, key, &cached.entities, cached.cached_at)?;
    }
    Ok(hit)
  }

  fn get_entity<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CachedEntity<T>>> {
    if let Some(hit) = self.fast.get_entity(entity_key)? {
      return Ok(Some(hit));
    }

    let hit = self.durable.get_entity::<T>(entity_key)?;
    if let Some(ref cached) = hit {
      self.fast.store_entity(&cached.entity, cached.cached_at)?;
    }
    Ok(hit)
  }

  fn store_entity<T: Cacheable>(&self, entity: &T, cached_at: DateTime<Utc>) -> Result<()> {
    self.durable.store_entity(entity, cached_at)?;
    self.fast.store_entity(entity, cached_at)
  }

  fn clear(&self) -> Result<()> {
    self.durable.clear()?;
    self.fast.clear()
  }
}
