//! Jobs, items, materials and recipes.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension, Row};

use super::models::CatalogCounts;
use super::{now, Database};
use crate::api::types::{Ingredient, Item, Job, Material, Recipe, RecipeListing};

const ITEM_COLUMNS: &str = "id, name, level, type_name, icon_id, job_id";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
  Ok(Item {
    id: row.get(0)?,
    name: row.get(1)?,
    level: row.get(2)?,
    type_name: row.get(3)?,
    icon_id: row.get(4)?,
    job_id: row.get(5)?,
  })
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn like_pattern(query: &str) -> String {
  let mut escaped = String::with_capacity(query.len() + 2);
  escaped.push('%');
  for c in query.trim().chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

impl Database {
  pub fn upsert_jobs(&mut self, jobs: &[Job]) -> Result<usize> {
    let tx = self
      .conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for job in jobs {
      tx.execute(
        "INSERT INTO jobs (id, name) VALUES (?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        params![job.id, job.name],
      )
      .map_err(|e| eyre!("Failed to store job {}: {}", job.id, e))?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit jobs: {}", e))?;
    Ok(jobs.len())
  }

  /// Insert or update items. Missing optional fields keep their stored value.
  pub fn upsert_items(&mut self, items: &[Item]) -> Result<usize> {
    let updated_at = now();
    let tx = self
      .conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for item in items {
      tx.execute(
        "INSERT INTO items (id, name, level, type_name, icon_id, job_id, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           level = excluded.level,
           type_name = COALESCE(excluded.type_name, items.type_name),
           icon_id = COALESCE(excluded.icon_id, items.icon_id),
           job_id = COALESCE(excluded.job_id, items.job_id),
           updated_at = excluded.updated_at",
        params![
          item.id,
          item.name,
          item.level,
          item.type_name,
          item.icon_id,
          item.job_id,
          updated_at
        ],
      )
      .map_err(|e| eyre!("Failed to store item {}: {}", item.id, e))?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit items: {}", e))?;
    Ok(items.len())
  }

  /// Insert or update materials.
  ///
  /// Placeholder names (`#<id>`) never overwrite a known name.
  pub fn upsert_materials(&mut self, materials: &[Material]) -> Result<usize> {
    let updated_at = now();
    let tx = self
      .conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for material in materials {
      tx.execute(
        "INSERT INTO materials (id, name, level, icon_id, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = CASE WHEN excluded.name LIKE '#%' THEN materials.name ELSE excluded.name END,
           level = MAX(excluded.level, materials.level),
           icon_id = COALESCE(excluded.icon_id, materials.icon_id),
           updated_at = excluded.updated_at",
        params![
          material.id,
          material.name,
          material.level,
          material.icon_id,
          updated_at
        ],
      )
      .map_err(|e| eyre!("Failed to store material {}: {}", material.id, e))?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit materials: {}", e))?;
    Ok(materials.len())
  }

  /// Insert or replace recipes. The result item and every material must exist.
  pub fn upsert_recipes(&mut self, recipes: &[Recipe]) -> Result<usize> {
    let updated_at = now();
    let tx = self
      .conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for recipe in recipes {
      tx.execute(
        "INSERT INTO recipes (item_id, job_id, level, updated_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(item_id) DO UPDATE SET
           job_id = excluded.job_id,
           level = excluded.level,
           updated_at = excluded.updated_at",
        params![recipe.result_item_id, recipe.job_id, recipe.level, updated_at],
      )
      .map_err(|e| eyre!("Failed to store recipe for item {}: {}", recipe.result_item_id, e))?;

      tx.execute(
        "DELETE FROM recipe_ingredients WHERE item_id = ?",
        params![recipe.result_item_id],
      )
      .map_err(|e| eyre!("Failed to clear ingredients for item {}: {}", recipe.result_item_id, e))?;

      for (position, ingredient) in recipe.ingredients.iter().enumerate() {
        tx.execute(
          "INSERT INTO recipe_ingredients (item_id, material_id, quantity, position)
           VALUES (?, ?, ?, ?)",
          params![
            recipe.result_item_id,
            ingredient.material_id,
            ingredient.quantity,
            position
          ],
        )
        .map_err(|e| {
          eyre!(
            "Failed to store ingredient {} of item {}: {}",
            ingredient.material_id,
            recipe.result_item_id,
            e
          )
        })?;
      }
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit recipes: {}", e))?;
    Ok(recipes.len())
  }

  /// Store a recipe together with its result item and materials.
  pub fn store_listing(&mut self, listing: &RecipeListing) -> Result<()> {
    self.upsert_items(std::slice::from_ref(&listing.result))?;
    self.upsert_materials(&listing.materials)?;
    self.upsert_recipes(std::slice::from_ref(&listing.recipe))?;
    Ok(())
  }

  pub fn get_item(&self, id: u64) -> Result<Option<Item>> {
    self
      .conn
      .query_row(
        &format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS),
        params![id],
        item_from_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read item {}: {}", id, e))
  }

  /// Case-insensitive name search over craftable items.
  pub fn search_items(&self, query: &str, limit: u32) -> Result<Vec<Item>> {
    let mut stmt = self
      .conn
      .prepare(&format!(
        "SELECT {} FROM items i
         WHERE i.name LIKE ? ESCAPE '\\'
           AND EXISTS (SELECT 1 FROM recipes r WHERE r.item_id = i.id)
         ORDER BY i.level, i.name
         LIMIT ?",
        ITEM_COLUMNS
      ))
      .map_err(|e| eyre!("Failed to prepare search: {}", e))?;

    let items = stmt
      .query_map(params![like_pattern(query), limit], item_from_row)
      .map_err(|e| eyre!("Failed to search items: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read search results: {}", e))?;

    Ok(items)
  }

  /// Recipe producing `item_id`, with the records it references.
  pub fn get_recipe(&self, item_id: u64) -> Result<Option<RecipeListing>> {
    let header: Option<(u64, u32)> = self
      .conn
      .query_row(
        "SELECT job_id, level FROM recipes WHERE item_id = ?",
        params![item_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read recipe for item {}: {}", item_id, e))?;

    let Some((job_id, level)) = header else {
      return Ok(None);
    };

    let result = self
      .get_item(item_id)?
      .ok_or_else(|| eyre!("Recipe for item {} has no item row", item_id))?;

    let mut stmt = self
      .conn
      .prepare(
        "SELECT ri.material_id, ri.quantity, m.name, m.level, m.icon_id
         FROM recipe_ingredients ri
         INNER JOIN materials m ON m.id = ri.material_id
         WHERE ri.item_id = ?
         ORDER BY ri.position",
      )
      .map_err(|e| eyre!("Failed to prepare ingredient query: {}", e))?;

    let rows = stmt
      .query_map(params![item_id], |row| {
        Ok((
          Ingredient {
            material_id: row.get(0)?,
            quantity: row.get(1)?,
          },
          Material {
            id: row.get(0)?,
            name: row.get(2)?,
            level: row.get(3)?,
            icon_id: row.get(4)?,
          },
        ))
      })
      .map_err(|e| eyre!("Failed to query ingredients: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read ingredients: {}", e))?;

    let (ingredients, materials): (Vec<_>, Vec<_>) = rows.into_iter().unzip();

    Ok(Some(RecipeListing {
      recipe: Recipe {
        result_item_id: item_id,
        job_id,
        level,
        ingredients,
      },
      result,
      materials,
    }))
  }

  pub fn list_jobs(&self) -> Result<Vec<Job>> {
    let mut stmt = self
      .conn
      .prepare("SELECT id, name FROM jobs ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare job query: {}", e))?;
    let jobs = stmt
      .query_map([], |row| {
        Ok(Job {
          id: row.get(0)?,
          name: row.get(1)?,
        })
      })
      .map_err(|e| eyre!("Failed to query jobs: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read jobs: {}", e))?;
    Ok(jobs)
  }

  pub fn counts(&self) -> Result<CatalogCounts> {
    let count = |table: &str| -> Result<u64> {
      self
        .conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
          row.get(0)
        })
        .map_err(|e| eyre!("Failed to count {}: {}", table, e))
    };

    Ok(CatalogCounts {
      jobs: count("jobs")?,
      items: count("items")?,
      materials: count("materials")?,
      recipes: count("recipes")?,
    })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) fn sample_listing(item_id: u64, name: &str) -> RecipeListing {
    RecipeListing {
      recipe: Recipe {
        result_item_id: item_id,
        job_id: 11,
        level: 20,
        ingredients: vec![
          Ingredient {
            material_id: 1,
            quantity: 3,
          },
          Ingredient {
            material_id: 2,
            quantity: 1,
          },
        ],
      },
      result: Item {
        id: item_id,
        name: name.to_string(),
        level: 20,
        type_name: Some("Sword".to_string()),
        icon_id: None,
        job_id: Some(11),
      },
      materials: vec![
        Material {
          id: 1,
          name: "Iron".to_string(),
          level: 1,
          icon_id: Some(10),
        },
        Material {
          id: 2,
          name: "Ash Wood".to_string(),
          level: 5,
          icon_id: None,
        },
      ],
    }
  }

  #[test]
  fn test_store_and_read_listing() {
    let mut db = Database::open_in_memory().unwrap();
    let listing = sample_listing(100, "Iron Sword");
    db.store_listing(&listing).unwrap();

    let stored = db.get_recipe(100).unwrap().unwrap();
    assert_eq!(stored, listing);
    assert!(db.get_recipe(999).unwrap().is_none());
  }

  #[test]
  fn test_item_upsert_keeps_recipe_and_optional_fields() {
    let mut db = Database::open_in_memory().unwrap();
    db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();

    db.upsert_items(&[Item {
      id: 100,
      name: "Iron Sword II".to_string(),
      level: 21,
      type_name: None,
      icon_id: None,
      job_id: None,
    }])
    .unwrap();

    let item = db.get_item(100).unwrap().unwrap();
    assert_eq!(item.name, "Iron Sword II");
    assert_eq!(item.type_name.as_deref(), Some("Sword"));
    assert_eq!(item.job_id, Some(11));
    assert!(db.get_recipe(100).unwrap().is_some());
  }

  #[test]
  fn test_placeholder_material_keeps_known_name() {
    let mut db = Database::open_in_memory().unwrap();
    db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();
    db.upsert_materials(&[Material {
      id: 1,
      name: "#1".to_string(),
      level: 0,
      icon_id: None,
    }])
    .unwrap();

    let recipe = db.get_recipe(100).unwrap().unwrap();
    assert_eq!(recipe.materials[0].name, "Iron");
    assert_eq!(recipe.materials[0].icon_id, Some(10));
  }

  #[test]
  fn test_recipe_with_unknown_material_is_rejected() {
    let mut db = Database::open_in_memory().unwrap();
    let listing = sample_listing(100, "Iron Sword");
    db.upsert_items(&[listing.result.clone()]).unwrap();

    assert!(db.upsert_recipes(&[listing.recipe]).is_err());
    // The failed transaction left nothing behind
    assert!(db.get_recipe(100).unwrap().is_none());
  }

  #[test]
  fn test_search_only_returns_craftable_matches() {
    let mut db = Database::open_in_memory().unwrap();
    db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();
    db.store_listing(&sample_listing(101, "Iron_Shield")).unwrap();
    db.upsert_items(&[Item {
      id: 200,
      name: "Iron Ore".to_string(),
      level: 1,
      type_name: None,
      icon_id: None,
      job_id: None,
    }])
    .unwrap();

    let names: Vec<_> = db
      .search_items("iron", 10)
      .unwrap()
      .into_iter()
      .map(|i| i.name)
      .collect();
    assert_eq!(names, vec!["Iron Sword", "Iron_Shield"]);

    // `_` is matched literally
    let literal = db.search_items("n_s", 10).unwrap();
    assert_eq!(literal.len(), 1);
    assert_eq!(literal[0].id, 101);

    assert_eq!(db.search_items("iron", 1).unwrap().len(), 1);
  }

  #[test]
  fn test_counts() {
    let mut db = Database::open_in_memory().unwrap();
    db.upsert_jobs(&[Job {
      id: 11,
      name: "Smith".to_string(),
    }])
    .unwrap();
    db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();

    let counts = db.counts().unwrap();
    assert_eq!(
      counts,
      CatalogCounts {
        jobs: 1,
        items: 1,
        materials: 2,
        recipes: 1,
      }
    );
    assert_eq!(db.list_jobs().unwrap()[0].name, "Smith");
  }
}
