use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
  pub id: i64,
  pub name: String,
  pub created_at: DateTime<Utc>,
}

/// Price a user entered for an item or material
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceEntry {
  pub user_id: i64,
  pub object_id: u64,
  pub price: u64,
  pub recorded_at: DateTime<Utc>,
}

/// Row counts per catalogue table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
  pub jobs: u64,
  pub items: u64,
  pub materials: u64,
  pub recipes: u64,
}
