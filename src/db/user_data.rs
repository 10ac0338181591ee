//! Users, favorites and price entries.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;

use super::models::{PriceEntry, User};
use super::{now, parse_timestamp, Database};
use crate::api::types::Item;

impl Database {
  pub fn create_user(&self, name: &str) -> Result<User> {
    let name = name.trim();
    if name.is_empty() {
      return Err(eyre!("User name must not be empty"));
    }

    self
      .conn
      .execute(
        "INSERT INTO users (name, created_at) VALUES (?, ?)",
        params![name, now()],
      )
      .map_err(|e| eyre!("Failed to create user '{}': {}", name, e))?;

    self
      .get_user_by_name(name)?
      .ok_or_else(|| eyre!("User '{}' missing after insert", name))
  }

  pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
    self
      .conn
      .query_row(
        "SELECT id, name, created_at FROM users WHERE name = ?",
        params![name.trim()],
        |row| {
          let created_at: String = row.get(2)?;
          Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: parse_timestamp(&created_at)?,
          })
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to read user '{}': {}", name, e))
  }

  /// Look a user up by name, creating it on first use.
  pub fn ensure_user(&self, name: &str) -> Result<User> {
    match self.get_user_by_name(name)? {
      Some(user) => Ok(user),
      None => self.create_user(name),
    }
  }

  fn item_exists(&self, id: u64) -> Result<bool> {
    self
      .conn
      .query_row("SELECT 1 FROM items WHERE id = ?", params![id], |_| Ok(()))
      .optional()
      .map(|r| r.is_some())
      .map_err(|e| eyre!("Failed to look up item {}: {}", id, e))
  }

  /// Mark an item as favorite. Returns false if it already was.
  pub fn add_favorite(&self, user_id: i64, item_id: u64) -> Result<bool> {
    if !self.item_exists(item_id)? {
      return Err(eyre!("Unknown item {}", item_id));
    }

    let inserted = self
      .conn
      .execute(
        "INSERT OR IGNORE INTO favorites (user_id, item_id, created_at) VALUES (?, ?, ?)",
        params![user_id, item_id, now()],
      )
      .map_err(|e| eyre!("Failed to add favorite {}: {}", item_id, e))?;

    Ok(inserted == 1)
  }

  /// Returns false if the item was not a favorite.
  pub fn remove_favorite(&self, user_id: i64, item_id: u64) -> Result<bool> {
    let removed = self
      .conn
      .execute(
        "DELETE FROM favorites WHERE user_id = ? AND item_id = ?",
        params![user_id, item_id],
      )
      .map_err(|e| eyre!("Failed to remove favorite {}: {}", item_id, e))?;

    Ok(removed == 1)
  }

  /// Favorite items, oldest first.
  pub fn list_favorites(&self, user_id: i64) -> Result<Vec<Item>> {
    let mut stmt = self
      .conn
      .prepare(
        "SELECT i.id, i.name, i.level, i.type_name, i.icon_id, i.job_id
         FROM favorites f
         INNER JOIN items i ON i.id = f.item_id
         WHERE f.user_id = ?
         ORDER BY f.created_at, i.id",
      )
      .map_err(|e| eyre!("Failed to prepare favorites query: {}", e))?;

    let items = stmt
      .query_map(params![user_id], |row| {
        Ok(Item {
          id: row.get(0)?,
          name: row.get(1)?,
          level: row.get(2)?,
          type_name: row.get(3)?,
          icon_id: row.get(4)?,
          job_id: row.get(5)?,
        })
      })
      .map_err(|e| eyre!("Failed to query favorites: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read favorites: {}", e))?;

    Ok(items)
  }

  /// Record the latest price of an item or material for a user.
  pub fn set_price(&self, user_id: i64, object_id: u64, price: u64) -> Result<PriceEntry> {
    let known: bool = self
      .conn
      .query_row(
        "SELECT EXISTS (SELECT 1 FROM items WHERE id = ?1)
             OR EXISTS (SELECT 1 FROM materials WHERE id = ?1)",
        params![object_id],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to look up object {}: {}", object_id, e))?;
    if !known {
      return Err(eyre!("Unknown item or material {}", object_id));
    }

    self
      .conn
      .execute(
        "INSERT INTO prices (user_id, object_id, price, recorded_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(user_id, object_id) DO UPDATE SET
           price = excluded.price,
           recorded_at = excluded.recorded_at",
        params![user_id, object_id, price, now()],
      )
      .map_err(|e| eyre!("Failed to store price for {}: {}", object_id, e))?;

    self
      .get_price(user_id, object_id)?
      .ok_or_else(|| eyre!("Price for {} missing after insert", object_id))
  }

  pub fn get_price(&self, user_id: i64, object_id: u64) -> Result<Option<PriceEntry>> {
    self
      .conn
      .query_row(
        "SELECT user_id, object_id, price, recorded_at FROM prices
         WHERE user_id = ? AND object_id = ?",
        params![user_id, object_id],
        price_from_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read price for {}: {}", object_id, e))
  }

  /// Prices for the given ids; ids without a price are absent from the map.
  pub fn prices_for(&self, user_id: i64, object_ids: &[u64]) -> Result<HashMap<u64, u64>> {
    let mut prices = HashMap::with_capacity(object_ids.len());
    for id in object_ids {
      if let Some(entry) = self.get_price(user_id, *id)? {
        prices.insert(entry.object_id, entry.price);
      }
    }
    Ok(prices)
  }

  /// Every price of a user, with the item or material name when known.
  pub fn list_prices(&self, user_id: i64) -> Result<Vec<(PriceEntry, Option<String>)>> {
    let mut stmt = self
      .conn
      .prepare(
        "SELECT p.user_id, p.object_id, p.price, p.recorded_at, COALESCE(i.name, m.name)
         FROM prices p
         LEFT JOIN items i ON i.id = p.object_id
         LEFT JOIN materials m ON m.id = p.object_id
         WHERE p.user_id = ?
         ORDER BY p.object_id",
      )
      .map_err(|e| eyre!("Failed to prepare price query: {}", e))?;

    let rows = stmt
      .query_map(params![user_id], |row| Ok((price_from_row(row)?, row.get(4)?)))
      .map_err(|e| eyre!("Failed to query prices: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read prices: {}", e))?;

    Ok(rows)
  }
}

fn price_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceEntry> {
  let recorded_at: String = row.get(3)?;
  Ok(PriceEntry {
    user_id: row.get(0)?,
    object_id: row.get(1)?,
    price: row.get(2)?,
    recorded_at: parse_timestamp(&recorded_at)?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::catalog::tests::sample_listing;

  fn seeded() -> Database {
    let mut db = Database::open_in_memory().unwrap();
    db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();
    db
  }

  #[test]
  fn test_user_names_are_unique() {
    let db = seeded();
    let alice = db.create_user("alice").unwrap();
    assert!(db.create_user("alice").is_err());
    assert_eq!(db.ensure_user(" alice ").unwrap().id, alice.id);
    assert!(db.create_user("   ").is_err());
  }

  #[test]
  fn test_one_favorite_per_user_and_item() {
    let db = seeded();
    let alice = db.ensure_user("alice").unwrap();
    let bob = db.ensure_user("bob").unwrap();

    assert!(db.add_favorite(alice.id, 100).unwrap());
    assert!(!db.add_favorite(alice.id, 100).unwrap());
    assert!(db.add_favorite(bob.id, 100).unwrap());

    assert_eq!(db.list_favorites(alice.id).unwrap().len(), 1);
    assert!(db.remove_favorite(alice.id, 100).unwrap());
    assert!(!db.remove_favorite(alice.id, 100).unwrap());
    assert!(db.list_favorites(alice.id).unwrap().is_empty());
    assert_eq!(db.list_favorites(bob.id).unwrap().len(), 1);
  }

  #[test]
  fn test_favorite_requires_known_item() {
    let db = seeded();
    let alice = db.ensure_user("alice").unwrap();
    let err = db.add_favorite(alice.id, 4242).unwrap_err();
    assert!(err.to_string().contains("Unknown item"));
  }

  #[test]
  fn test_set_price_replaces_previous_entry() {
    let db = seeded();
    let alice = db.ensure_user("alice").unwrap();

    db.set_price(alice.id, 1, 120).unwrap();
    let entry = db.set_price(alice.id, 1, 95).unwrap();
    assert_eq!(entry.price, 95);

    let listed = db.list_prices(alice.id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].1.as_deref(), Some("Iron"));
  }

  #[test]
  fn test_prices_are_per_user() {
    let db = seeded();
    let alice = db.ensure_user("alice").unwrap();
    let bob = db.ensure_user("bob").unwrap();

    db.set_price(alice.id, 1, 10).unwrap();
    db.set_price(alice.id, 100, 500).unwrap();
    db.set_price(bob.id, 1, 99).unwrap();

    let prices = db.prices_for(alice.id, &[1, 2, 100]).unwrap();
    assert_eq!(prices.get(&1), Some(&10));
    assert_eq!(prices.get(&100), Some(&500));
    assert!(!prices.contains_key(&2));
  }

  #[test]
  fn test_price_for_unknown_object_is_rejected() {
    let db = seeded();
    let alice = db.ensure_user("alice").unwrap();
    assert!(db.set_price(alice.id, 777, 1).is_err());
  }
}
