//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, QueryKey};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client,
/// providing transparent caching with offline support.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      stale_time: Duration::hours(24),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// An entry is stale once its age reaches the stale time.
  fn is_stale(&self, cached_at: DateTime<Utc>) -> bool {
    Utc::now() - cached_at >= self.stale_time
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. On network failure, return stale cache (offline mode)
  /// 4. Update cache with new data
  pub async fn fetch_list<T, K, F, Fut>(
    &self,
    key: &K,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    K: QueryKey,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let hash = key.cache_hash();

    if let Some(cached) = self.storage.get_query_result::<T>(&hash)? {
      if !self.is_stale(cached.cached_at) {
        debug!(query = %key.description(), "cache hit");
        return Ok(CacheResult::from_cache(cached.entities, cached.cached_at));
      }

      match fetcher().await {
        Ok(data) => {
          self
            .storage
            .store_query_result(&hash, &key.description(), &data, Utc::now())?;
          Ok(CacheResult::from_network(data))
        }
        Err(e) => {
          warn!(query = %key.description(), error = %e, "refresh failed, serving stale cache");
          Ok(CacheResult::offline(cached.entities, cached.cached_at))
        }
      }
    } else {
      debug!(query = %key.description(), "cache miss");
      let data = fetcher().await?;
      self
        .storage
        .store_query_result(&hash, &key.description(), &data, Utc::now())?;
      Ok(CacheResult::from_network(data))
    }
  }

  /// Fetch a single entity with caching.
  pub async fn fetch_one<T, F, Fut>(&self, entity_key: &str, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some(cached) = self.storage.get_entity::<T>(entity_key)? {
      if !self.is_stale(cached.cached_at) {
        debug!(entity = T::entity_type(), key = entity_key, "cache hit");
        return Ok(CacheResult::from_cache(cached.entity, cached.cached_at));
      }

      match fetcher().await {
        Ok(data) => {
          self.storage.store_entity(&data, Utc::now())?;
          Ok(CacheResult::from_network(data))
        }
        Err(e) => {
          warn!(entity = T::entity_type(), key = entity_key, error = %e, "refresh failed, serving stale cache");
          Ok(CacheResult::offline(cached.entity, cached.cached_at))
        }
      }
    } else {
      let data = fetcher().await?;
      self.storage.store_entity(&data, Utc::now())?;
      Ok(CacheResult::from_network(data))
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      stale_time: self.stale_time,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::memory::MemoryStorage;
  use crate::cache::traits::CacheSource;
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};
  use std::sync::atomic::{AtomicU32, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Widget {
    id: u64,
  }

  impl Cacheable for Widget {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }

    fn entity_type() -> &'static str {
      "widget"
    }
  }

  struct Key(&'static str);

  impl QueryKey for Key {
    fn cache_hash(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  #[tokio::test]
  async fn test_fresh_hit_skips_fetch() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
      let result = layer
        .fetch_list(&Key("widgets"), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(vec![Widget { id: 1 }])
        })
        .await
        .unwrap();
      assert_eq!(result.data, vec![Widget { id: 1 }]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_second_lookup_reports_cache_source() {
    let layer = CacheLayer::new(MemoryStorage::new());

    let first = layer
      .fetch_one("1", || async { Ok(Widget { id: 1 }) })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = layer
      .fetch_one("1", || async { Err::<Widget, _>(eyre!("should not be called")) })
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert!(second.cached_at.is_some());
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched() {
    let layer = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::zero());
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      let result = layer
        .fetch_list(&Key("widgets"), || async {
          let n = calls.fetch_add(1, Ordering::SeqCst);
          Ok(vec![Widget { id: n as u64 }])
        })
        .await
        .unwrap();
      assert_eq!(result.source, CacheSource::Network);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_expired_entry_served_when_refresh_fails() {
    let layer = CacheLayer::new(MemoryStorage::new()).with_stale_time(Duration::zero());

    layer
      .fetch_one("9", || async { Ok(Widget { id: 9 }) })
      .await
      .unwrap();

    let result = layer
      .fetch_one("9", || async { Err::<Widget, _>(eyre!("network down")) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, Widget { id: 9 });
  }

  #[tokio::test]
  async fn test_miss_propagates_fetch_error() {
    let layer = CacheLayer::new(MemoryStorage::new());
    let result = layer
      .fetch_list::<Widget, _, _, _>(&Key("widgets"), || async { Err(eyre!("boom")) })
      .await;
    assert!(result.is_err());
  }
}
