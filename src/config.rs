use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "CRAFTBENCH_API_URL";

/// A sale tax of 100%.
pub const MAX_TAX_BASIS_POINTS: u32 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub import: ImportConfig,
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default)]
  pub profit: ProfitConfig,
  /// User name used when `--user` is not given
  pub default_user: Option<String>,
  /// Directory for rolling log files (stderr only when unset)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Preferred language for localised names
  pub lang: String,
  pub timeout_secs: u64,
  pub user_agent: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.dofusdb.fr".to_string(),
      lang: "en".to_string(),
      timeout_secs: 30,
      user_agent: concat!("craftbench/", env!("CARGO_PKG_VERSION")).to_string(),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// How long a cached lookup stays fresh
  pub ttl_secs: u64,
  /// Keep an in-process tier in front of the SQLite cache
  pub memory: bool,
  /// Cache database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: 24 * 60 * 60,
      memory: true,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
  /// Records per write chunk and per enrichment chunk
  pub batch_size: usize,
  /// Pause between chunks
  pub batch_delay_ms: u64,
  /// Rows requested per listing page (clamped to the API maximum)
  pub page_limit: u32,
  /// Upper bound on pages fetched for one listing
  pub max_pages: u32,
}

impl Default for ImportConfig {
  fn default() -> Self {
    Self {
      batch_size: 50,
      batch_delay_ms: 500,
      page_limit: 50,
      max_pages: 1000,
    }
  }
}

impl ImportConfig {
  pub fn batch_delay(&self) -> Duration {
    Duration::from_millis(self.batch_delay_ms)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
  /// Catalogue database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfitConfig {
  /// Auction-house sale tax, in hundredths of a percent
  pub tax_basis_points: u32,
}

impl Default for ProfitConfig {
  fn default() -> Self {
    Self {
      tax_basis_points: 200,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./craftbench.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/craftbench/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      config.api.base_url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("craftbench.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("craftbench").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty file is a valid "all defaults" config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn validate(&self) -> Result<()> {
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
    if self.import.batch_size == 0 {
      return Err(eyre!("import.batch_size must be at least 1"));
    }
    if self.import.page_limit == 0 {
      return Err(eyre!("import.page_limit must be at least 1"));
    }
    if self.profit.tax_basis_points > MAX_TAX_BASIS_POINTS {
      return Err(eyre!(
        "profit.tax_basis_points must be at most {} (100%), got {}",
        MAX_TAX_BASIS_POINTS,
        self.profit.tax_basis_points
      ));
    }
    Ok(())
  }

  /// Root directory for the databases and logs.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("craftbench"))
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database.path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("craftbench.db")),
    }
  }

  pub fn cache_path(&self) -> Result<PathBuf> {
    match &self.cache.path {
      Some(p) => Ok(p.clone()),
      None => Ok(Self::data_dir()?.join("cache.db")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_yaml_gives_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.import.batch_size, 50);
    assert_eq!(config.profit.tax_basis_points, 200);
    assert!(config.cache.enabled);
  }

  #[test]
  fn test_partial_sections_keep_defaults() {
    let yaml = r#"
api:
  lang: fr
import:
  batch_size: 10
default_user: alice
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.api.lang, "fr");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.import.batch_size, 10);
    assert_eq!(config.import.batch_delay_ms, 500);
    assert_eq!(config.default_user.as_deref(), Some("alice"));
  }

  #[test]
  fn test_validate_rejects_zero_batch() {
    let mut config = Config::default();
    config.import.batch_size = 0;
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validate_rejects_bad_url() {
    let mut config = Config::default();
    config.api.base_url = "not a url".to_string();
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_validate_bounds_tax_rate() {
    let mut config = Config::default();
    config.profit.tax_basis_points = MAX_TAX_BASIS_POINTS;
    assert!(config.validate().is_ok());

    config.profit.tax_basis_points = 15_000;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("tax_basis_points"));
  }

  #[test]
  fn test_env_overrides_api_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "api:\n  base_url: http://from-file.test\n").unwrap();

    std::env::set_var(API_URL_ENV, "http://from-env.test");
    let loaded = Config::load(Some(&path));
    std::env::remove_var(API_URL_ENV);

    assert_eq!(loaded.unwrap().api.base_url, "http://from-env.test");
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/nonexistent/craftbench.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
