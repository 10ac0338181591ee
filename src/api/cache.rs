//! Caching implementations for game-data types.

use sha2::{Digest, Sha256};

use crate::cache::{Cacheable, QueryKey};

use super::types::{Item, RecipeListing};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Item {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "item"
  }
}

impl Cacheable for RecipeListing {
  fn cache_key(&self) -> String {
    self.recipe.result_item_id.to_string()
  }

  fn entity_type() -> &'static str {
    "recipe"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for cached game-data lookups.
#[derive(Clone, Debug)]
pub enum GameQueryKey {
  /// Search items by name
  ItemSearch {
    query: String,
    lang: String,
    limit: u32,
  },
  /// Recipe producing an item (zero or one result)
  ItemRecipe { item_id: u64, lang: String },
}

impl QueryKey for GameQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::ItemSearch { query, lang, limit } => {
        format!("item_search:{}:{}:{}", lang, limit, normalize_query(query))
      }
      Self::ItemRecipe { item_id, lang } => format!("item_recipe:{}:{}", lang, item_id),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::ItemSearch { query, lang, .. } => format!("items matching '{}' ({})", query, lang),
      Self::ItemRecipe { item_id, lang } => format!("recipe for item {} ({})", item_id, lang),
    }
  }
}

/// Normalize a search query for consistent hashing.
/// Trims, collapses inner whitespace and lowercases.
fn normalize_query(query: &str) -> String {
  query
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}
