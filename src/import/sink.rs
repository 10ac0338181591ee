//! Destinations for imported records.

use color_eyre::Result;
use std::path::PathBuf;

use super::snapshot::Snapshot;
use crate::api::types::{Item, Job, Material, Recipe};
use crate::db::Database;

/// Receives imported records chunk by chunk.
///
/// Each call returns the number of rows written. Items and materials are
/// always written before the recipes that reference them.
pub trait ImportSink {
  fn write_jobs(&mut self, jobs: &[Job]) -> Result<usize>;
  fn write_items(&mut self, items: &[Item]) -> Result<usize>;
  fn write_materials(&mut self, materials: &[Material]) -> Result<usize>;
  fn write_recipes(&mut self, recipes: &[Recipe]) -> Result<usize>;

  /// Called once after the last chunk.
  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}

/// Writes into the SQLite catalogue.
pub struct DatabaseSink<'a> {
  db: &'a mut Database,
}

impl<'a> DatabaseSink<'a> {
  pub fn new(db: &'a mut Database) -> Self {
    Self { db }
  }
}

impl ImportSink for DatabaseSink<'_> {
  fn write_jobs(&mut self, jobs: &[Job]) -> Result<usize> {
    self.db.upsert_jobs(jobs)
  }

  fn write_items(&mut self, items: &[Item]) -> Result<usize> {
    self.db.upsert_items(items)
  }

  fn write_materials(&mut self, materials: &[Material]) -> Result<usize> {
    self.db.upsert_materials(materials)
  }

  fn write_recipes(&mut self, recipes: &[Recipe]) -> Result<usize> {
    self.db.upsert_recipes(recipes)
  }
}

/// Accumulates records and writes a JSON snapshot on `finish`.
pub struct SnapshotSink {
  path: PathBuf,
  snapshot: Snapshot,
}

impl SnapshotSink {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      snapshot: Snapshot::default(),
    }
  }
}

impl ImportSink for SnapshotSink {
  fn write_jobs(&mut self, jobs: &[Job]) -> Result<usize> {
    self.snapshot.jobs.extend_from_slice(jobs);
    Ok(jobs.len())
  }

  fn write_items(&mut self, items: &[Item]) -> Result<usize> {
    self.snapshot.items.extend_from_slice(items);
    Ok(items.len())
  }

  fn write_materials(&mut self, materials: &[Material]) -> Result<usize> {
    self.snapshot.materials.extend_from_slice(materials);
    Ok(materials.len())
  }

  fn write_recipes(&mut self, recipes: &[Recipe]) -> Result<usize> {
    self.snapshot.recipes.extend_from_slice(recipes);
    Ok(recipes.len())
  }

  fn finish(&mut self) -> Result<()> {
    self.snapshot.generated_at = chrono::Utc::now();
    self.snapshot.save(&self.path)
  }
}
