//! Serde-deserializable types matching game-data API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::types::{Ingredient, Item, Job, Material, Recipe, RecipeListing};

/// Names come back as a `{lang: text}` map.
pub type LocalizedText = BTreeMap<String, String>;

// ============================================================================
// Listing envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPage<T> {
  #[serde(default)]
  pub total: Option<u64>,
  #[serde(default = "Vec::new")]
  pub data: Vec<T>,
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiJob {
  pub id: u64,
  #[serde(default)]
  pub name: LocalizedText,
}

#[derive(Debug, Deserialize)]
pub struct ApiItemType {
  #[serde(default)]
  pub name: LocalizedText,
}

#[derive(Debug, Deserialize)]
pub struct ApiItem {
  pub id: u64,
  #[serde(default)]
  pub name: LocalizedText,
  #[serde(default)]
  pub level: u32,
  #[serde(rename = "iconId")]
  pub icon_id: Option<u64>,
  #[serde(rename = "type")]
  pub item_type: Option<ApiItemType>,
}

#[derive(Debug, Deserialize)]
pub struct ApiRecipe {
  #[serde(rename = "resultId")]
  pub result_id: u64,
  #[serde(rename = "resultName", default)]
  pub result_name: LocalizedText,
  #[serde(rename = "resultLevel", default)]
  pub result_level: u32,
  #[serde(rename = "jobId")]
  pub job_id: u64,
  #[serde(rename = "ingredientIds", default)]
  pub ingredient_ids: Vec<u64>,
  #[serde(default)]
  pub quantities: Vec<u32>,
  /// Expanded ingredient records, when the API includes them
  #[serde(default)]
  pub ingredients: Vec<ApiItem>,
  /// Expanded result record, when the API includes it
  pub result: Option<ApiItem>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

/// Pick `lang`, then English, then whatever text is available.
pub fn localized(text: &LocalizedText, lang: &str) -> String {
  text
    .get(lang)
    .or_else(|| text.get("en"))
    .or_else(|| text.values().next())
    .cloned()
    .unwrap_or_default()
}

impl ApiJob {
  pub fn into_job(self, lang: &str) -> Job {
    Job {
      id: self.id,
      name: localized(&self.name, lang),
    }
  }
}

impl ApiItem {
  pub fn into_item(self, lang: &str) -> Item {
    Item {
      id: self.id,
      name: localized(&self.name, lang),
      level: self.level,
      type_name: self
        .item_type
        .map(|t| localized(&t.name, lang))
        .filter(|n| !n.is_empty()),
      icon_id: self.icon_id,
      job_id: None,
    }
  }

  pub fn into_material(self, lang: &str) -> Material {
    Material {
      id: self.id,
      name: localized(&self.name, lang),
      level: self.level,
      icon_id: self.icon_id,
    }
  }
}

impl ApiRecipe {
  /// Convert into a listing, rejecting records whose id and quantity arrays disagree.
  ///
  /// Repeated ingredient ids are merged and zero quantities dropped. Ingredients
  /// the API did not expand get a placeholder material named after their id.
  pub fn into_listing(self, lang: &str) -> Result<RecipeListing, String> {
    if self.ingredient_ids.len() != self.quantities.len() {
      return Err(format!(
        "recipe for item {} has {} ingredient ids but {} quantities",
        self.result_id,
        self.ingredient_ids.len(),
        self.quantities.len()
      ));
    }

    let mut ingredients: Vec<Ingredient> = Vec::with_capacity(self.ingredient_ids.len());
    for (material_id, quantity) in self.ingredient_ids.iter().zip(&self.quantities) {
      if *quantity == 0 {
        continue;
      }
      match ingredients.iter_mut().find(|i| i.material_id == *material_id) {
        Some(existing) => {
          existing.quantity = existing.quantity.checked_add(*quantity).ok_or_else(|| {
            format!(
              "recipe for item {} overflows the quantity of ingredient {}",
              self.result_id, material_id
            )
          })?;
        }
        None => ingredients.push(Ingredient {
          material_id: *material_id,
          quantity: *quantity,
        }),
      }
    }

    let mut expanded: BTreeMap<u64, Material> = self
      .ingredients
      .into_iter()
      .map(|i| (i.id, i.into_material(lang)))
      .collect();
    let materials = ingredients
      .iter()
      .map(|i| {
        expanded.remove(&i.material_id).unwrap_or_else(|| Material {
          id: i.material_id,
          name: format!("#{}", i.material_id),
          level: 0,
          icon_id: None,
        })
      })
      .collect();

    let mut result = match self.result {
      Some(item) => item.into_item(lang),
      None => Item {
        id: self.result_id,
        name: localized(&self.result_name, lang),
        level: self.result_level,
        type_name: None,
        icon_id: None,
        job_id: None,
      },
    };
    result.job_id = Some(self.job_id);
    if result.name.is_empty() {
      result.name = localized(&self.result_name, lang);
    }

    Ok(RecipeListing {
      recipe: Recipe {
        result_item_id: self.result_id,
        job_id: self.job_id,
        level: if self.result_level > 0 {
          self.result_level
        } else {
          result.level
        },
        ingredients,
      },
      result,
      materials,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn names(en: &str, fr: &str) -> serde_json::Value {
    json!({ "en": en, "fr": fr })
  }

  #[test]
  fn test_localized_fallbacks() {
    let mut text = LocalizedText::new();
    text.insert("de".to_string(), "Holz".to_string());
    assert_eq!(localized(&text, "fr"), "Holz");

    text.insert("en".to_string(), "Wood".to_string());
    assert_eq!(localized(&text, "fr"), "Wood");

    text.insert("fr".to_string(), "Bois".to_string());
    assert_eq!(localized(&text, "fr"), "Bois");

    assert_eq!(localized(&LocalizedText::new(), "fr"), "");
  }

  #[test]
  fn test_recipe_listing_merges_and_expands() {
    let raw = json!({
      "resultId": 100,
      "resultName": names("Sword", "Epee"),
      "resultLevel": 12,
      "jobId": 11,
      "ingredientIds": [1, 2, 1, 3],
      "quantities": [2, 5, 1, 0],
      "ingredients": [
        { "id": 1, "name": names("Iron", "Fer"), "level": 1, "iconId": 501 },
        { "id": 3, "name": names("Ash", "Frene"), "level": 1 }
      ]
    });
    let recipe: ApiRecipe = serde_json::from_value(raw).unwrap();
    let listing = recipe.into_listing("fr").unwrap();

    assert_eq!(listing.result.name, "Epee");
    assert_eq!(listing.result.job_id, Some(11));
    assert_eq!(listing.recipe.level, 12);
    assert_eq!(
      listing.recipe.ingredients,
      vec![
        Ingredient {
          material_id: 1,
          quantity: 3
        },
        Ingredient {
          material_id: 2,
          quantity: 5
        },
      ]
    );
    assert_eq!(listing.materials.len(), 2);
    assert_eq!(listing.materials[0].name, "Fer");
    assert_eq!(listing.materials[0].icon_id, Some(501));
    assert_eq!(listing.materials[1].name, "#2");
  }

  #[test]
  fn test_recipe_with_mismatched_arrays_is_rejected() {
    let raw = json!({
      "resultId": 7,
      "jobId": 2,
      "ingredientIds": [1, 2],
      "quantities": [1]
    });
    let recipe: ApiRecipe = serde_json::from_value(raw).unwrap();
    let err = recipe.into_listing("en").unwrap_err();
    assert!(err.contains("item 7"));
  }

  #[test]
  fn test_recipe_with_overflowing_quantity_is_rejected() {
    let raw = json!({
      "resultId": 8,
      "jobId": 2,
      "ingredientIds": [5, 5],
      "quantities": [4294967295u64, 1]
    });
    let recipe: ApiRecipe = serde_json::from_value(raw).unwrap();
    let err = recipe.into_listing("en").unwrap_err();
    assert!(err.contains("item 8"));
    assert!(err.contains("ingredient 5"));
  }

  #[test]
  fn test_page_tolerates_missing_fields() {
    let page: ApiPage<ApiJob> = serde_json::from_value(json!({})).unwrap();
    assert!(page.data.is_empty());
    assert!(page.total.is_none());
  }
}
