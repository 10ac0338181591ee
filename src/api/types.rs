use serde::{Deserialize, Serialize};

/// Crafting profession
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  pub id: u64,
  pub name: String,
}

/// Item as listed by the game-data API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
  pub id: u64,
  pub name: String,
  pub level: u32,
  pub type_name: Option<String>,
  pub icon_id: Option<u64>,
  /// Job that crafts this item, when it is craftable
  pub job_id: Option<u64>,
}

/// Item consumed by a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
  pub id: u64,
  pub name: String,
  pub level: u32,
  pub icon_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
  pub material_id: u64,
  pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
  pub result_item_id: u64,
  pub job_id: u64,
  pub level: u32,
  pub ingredients: Vec<Ingredient>,
}

/// A recipe together with the records it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeListing {
  pub recipe: Recipe,
  pub result: Item,
  pub materials: Vec<Material>,
}
