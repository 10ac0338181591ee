//! Local JSON snapshot of an imported catalogue.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::api::types::{Item, Job, Material, Recipe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub generated_at: DateTime<Utc>,
  #[serde(default)]
  pub jobs: Vec<Job>,
  #[serde(default)]
  pub items: Vec<Item>,
  #[serde(default)]
  pub materials: Vec<Material>,
  #[serde(default)]
  pub recipes: Vec<Recipe>,
}

impl Default for Snapshot {
  fn default() -> Self {
    Self {
      generated_at: Utc::now(),
      jobs: Vec::new(),
      items: Vec::new(),
      materials: Vec::new(),
      recipes: Vec::new(),
    }
  }
}

impl Snapshot {
  /// Write the snapshot as pretty JSON, replacing `path` atomically.
  pub fn save(&self, path: &Path) -> Result<()> {
    let parent = match path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p,
      _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
      .map_err(|e| eyre!("Failed to create snapshot directory {}: {}", parent.display(), e))?;

    let temp = tempfile::Builder::new()
      .prefix(".snapshot")
      .suffix(".tmp")
      .tempfile_in(parent)
      .map_err(|e| eyre!("Failed to create temporary snapshot file: {}", e))?;

    {
      let mut writer = BufWriter::new(temp.as_file());
      serde_json::to_writer_pretty(&mut writer, self)
        .map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;
      writer
        .flush()
        .map_err(|e| eyre!("Failed to write snapshot: {}", e))?;
    }

    temp
      .persist(path)
      .map_err(|e| eyre!("Failed to move snapshot into {}: {}", path.display(), e.error))?;
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read snapshot {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse snapshot {}: {}", path.display(), e))
  }
}
