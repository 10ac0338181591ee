//! Cached game-data client that wraps GameClient with transparent caching.

use chrono::Duration;
use color_eyre::Result;

use crate::cache::{
  CacheBackend, CacheLayer, CacheResult, CacheStorage, MemoryStorage, NoopStorage, SqliteStorage,
  TieredStorage,
};
use crate::config::Config;

use super::cache::GameQueryKey;
use super::client::GameClient;
use super::types::{Item, RecipeListing};

/// Longest TTL honoured (ten years).
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Game-data client with transparent caching support.
///
/// Searches, item details and single-recipe lookups are cached; the bulk
/// listings used by the importer go straight to `inner()`.
#[derive(Clone)]
pub struct CachedGameClient {
  inner: GameClient,
  cache: CacheLayer<CacheBackend>,
}

impl CachedGameClient {
  /// Create a cached client using the configured cache backend.
  pub fn new(config: &Config) -> Result<Self> {
    let inner = GameClient::new(&config.api, &config.import)?;

    let backend = if !config.cache.enabled {
      CacheBackend::Disabled(NoopStorage)
    } else {
      let durable = SqliteStorage::open(&config.cache_path()?)?;
      if config.cache.memory {
        CacheBackend::Tiered(TieredStorage::new(MemoryStorage::new(), durable))
      } else {
        CacheBackend::Durable(durable)
      }
    };

    let ttl = Duration::seconds(config.cache.ttl_secs.min(MAX_TTL_SECS) as i64);
    Ok(Self::with_cache(
      inner,
      CacheLayer::new(backend).with_stale_time(ttl),
    ))
  }

  pub fn with_cache(inner: GameClient, cache: CacheLayer<CacheBackend>) -> Self {
    Self { inner, cache }
  }

  /// Uncached client, for bulk listings.
  pub fn inner(&self) -> &GameClient {
    &self.inner
  }

  /// Search items by name with caching.
  pub async fn search_items(&self, query: &str, limit: u32) -> Result<CacheResult<Vec<Item>>> {
    let query_key = GameQueryKey::ItemSearch {
      query: query.to_string(),
      lang: self.inner.lang().to_string(),
      limit,
    };

    self
      .cache
      .fetch_list(&query_key, || {
        let inner = self.inner.clone();
        let query = query.to_string();
        async move { inner.search_items(&query, limit).await }
      })
      .await
  }

  /// Get a single item by id with caching.
  pub async fn get_item(&self, id: u64) -> Result<CacheResult<Item>> {
    self
      .cache
      .fetch_one(&id.to_string(), || {
        let inner = self.inner.clone();
        async move { inner.get_item(id).await }
      })
      .await
  }

  /// Get the recipe producing an item with caching.
  ///
  /// A "no recipe" answer is cached too, as an empty result.
  pub async fn get_recipe(&self, item_id: u64) -> Result<CacheResult<Option<RecipeListing>>> {
    let query_key = GameQueryKey::ItemRecipe {
      item_id,
      lang: self.inner.lang().to_string(),
    };

    let result = self
      .cache
      .fetch_list(&query_key, || {
        let inner = self.inner.clone();
        async move {
          let recipe = inner.get_recipe(item_id).await?;
          Ok::<Vec<RecipeListing>, color_eyre::Report>(recipe.into_iter().collect())
        }
      })
      .await?;

    Ok(CacheResult {
      data: result.data.into_iter().next(),
      source: result.source,
      cached_at: result.cached_at,
    })
  }

  /// Drop every cached lookup.
  pub fn clear_cache(&self) -> Result<()> {
    self.cache.storage().clear()
  }
}
