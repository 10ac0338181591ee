use crate::api::cached_client::CachedGameClient;
use crate::api::types::RecipeListing;
use crate::commands::{CacheCommand, Command, FavoriteCommand, PriceCommand};
use crate::config::Config;
use crate::db::Database;
use crate::import::{
  write_catalog, DatabaseSink, ImportOptions, ImportReport, Importer, Snapshot, SnapshotSink,
};
use crate::profit::{self, ProfitOptions};
use crate::render;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// User name when neither `--user` nor `default_user` is set
pub const DEFAULT_USER: &str = "default";

/// Main application state
pub struct App {
  /// Application configuration
  config: Config,

  /// Local catalogue and user data
  db: Database,

  /// Game-data client
  client: CachedGameClient,

  /// Name of the user prices and favorites belong to
  user_name: String,
}

impl App {
  pub fn new(config: Config, user: Option<String>) -> Result<Self> {
    let db = Database::open(&config.database_path()?)?;
    let client = CachedGameClient::new(&config)?;
    let user_name = user
      .or_else(|| config.default_user.clone())
      .unwrap_or_else(|| DEFAULT_USER.to_string());

    Ok(Self::with_parts(config, db, client, user_name))
  }

  pub fn with_parts(
    config: Config,
    db: Database,
    client: CachedGameClient,
    user_name: String,
  ) -> Self {
    Self {
      config,
      db,
      client,
      user_name,
    }
  }

  /// Execute a command and return its rendered output.
  pub async fn run(&mut self, command: Command) -> Result<String> {
    match command {
      Command::Import {
        jobs,
        details,
        snapshot,
        from_snapshot,
      } => self.import(jobs, details, snapshot, from_snapshot).await,
      Command::Search {
        query,
        remote,
        limit,
      } => self.search(&query, remote, limit).await,
      Command::Recipe { item_id } => {
        let listing = self.recipe_listing(item_id).await?;
        Ok(render::recipe(&listing))
      }
      Command::Price(action) => self.price(action),
      Command::Profit {
        item_id,
        sell,
        count,
      } => self.profit(item_id, sell, count).await,
      Command::Favorite(action) => self.favorite(action).await,
      Command::Cache(CacheCommand::Clear) => {
        self.client.clear_cache()?;
        Ok("Cache cleared.\n".to_string())
      }
      Command::Stats => Ok(render::counts(&self.db.counts()?, &self.db.list_jobs()?)),
    }
  }

  async fn import(
    &mut self,
    jobs: Vec<u64>,
    details: bool,
    snapshot: Option<PathBuf>,
    from_snapshot: Option<PathBuf>,
  ) -> Result<String> {
    let options = ImportOptions {
      job_ids: if jobs.is_empty() { None } else { Some(jobs) },
      with_details: details,
      ..ImportOptions::from_config(&self.config.import)
    };

    let report = if let Some(path) = from_snapshot {
      info!(path = %path.display(), "loading snapshot");
      let snapshot = Snapshot::load(&path)?;
      // No remote calls to space out
      let options = ImportOptions {
        batch_delay: Duration::ZERO,
        ..options
      };
      let mut report = ImportReport::default();
      write_catalog(&mut DatabaseSink::new(&mut self.db), &snapshot, &options, &mut report)
        .await?;
      report
    } else {
      let importer = Importer::new(self.client.inner());
      match snapshot {
        Some(path) => {
          info!(path = %path.display(), "importing into snapshot");
          importer
            .run(&mut SnapshotSink::new(path), &options)
            .await?
        }
        None => {
          importer
            .run(&mut DatabaseSink::new(&mut self.db), &options)
            .await?
        }
      }
    };

    Ok(render::import_report(&report))
  }

  async fn search(&self, query: &str, remote: bool, limit: u32) -> Result<String> {
    if query.trim().is_empty() {
      return Err(eyre!("Search query must not be empty"));
    }

    if remote {
      let result = self.client.search_items(query, limit).await?;
      return Ok(format!(
        "{}({})\n",
        render::items_table(&result.data),
        render::source_label(result.source)
      ));
    }

    let items = self.db.search_items(query, limit)?;
    let mut out = render::items_table(&items);
    if items.is_empty() {
      out.push_str("Import the catalogue with `craftbench import` or retry with --remote.\n");
    }
    Ok(out)
  }

  /// Recipe from the local catalogue, falling back to the API.
  ///
  /// Recipes found remotely are stored locally so prices and favorites can
  /// reference them.
  async fn recipe_listing(&mut self, item_id: u64) -> Result<RecipeListing> {
    if let Some(listing) = self.db.get_recipe(item_id)? {
      return Ok(listing);
    }

    let result = self.client.get_recipe(item_id).await?;
    let listing = result
      .data
      .ok_or_else(|| eyre!("Item {} has no recipe", item_id))?;
    info!(item = item_id, source = render::source_label(result.source), "recipe fetched");
    self.db.store_listing(&listing)?;
    Ok(listing)
  }

  fn price(&self, action: PriceCommand) -> Result<String> {
    let user = self.db.ensure_user(&self.user_name)?;
    match action {
      PriceCommand::Set { id, price } => {
        let entry = self.db.set_price(user.id, id, price)?;
        Ok(format!(
          "Price of #{} set to {}.\n",
          entry.object_id,
          render::format_amount(entry.price)
        ))
      }
      PriceCommand::List => Ok(render::prices(&self.db.list_prices(user.id)?)),
    }
  }

  async fn profit(&mut self, item_id: u64, sell: Option<u64>, count: u32) -> Result<String> {
    if count == 0 {
      return Err(eyre!("--count must be at least 1"));
    }

    let listing = self.recipe_listing(item_id).await?;
    let user = self.db.ensure_user(&self.user_name)?;

    let sell_price = match sell {
      Some(price) => price,
      None => self
        .db
        .get_price(user.id, item_id)?
        .map(|entry| entry.price)
        .ok_or_else(|| {
          eyre!(
            "No sell price for item {}: pass --sell or record one with `price set {} <PRICE>`",
            item_id,
            item_id
          )
        })?,
    };

    let material_ids: Vec<u64> = listing
      .recipe
      .ingredients
      .iter()
      .map(|i| i.material_id)
      .collect();
    let prices = self.db.prices_for(user.id, &material_ids)?;

    let report = profit::compute(
      &listing,
      &prices,
      sell_price,
      ProfitOptions {
        count,
        tax_basis_points: self.config.profit.tax_basis_points,
      },
    );
    Ok(render::profit(&report, &listing.result.name))
  }

  async fn favorite(&mut self, action: FavoriteCommand) -> Result<String> {
    let user = self.db.ensure_user(&self.user_name)?;
    match action {
      FavoriteCommand::Add { item_id } => {
        if self.db.get_item(item_id)?.is_none() {
          let item = self.client.get_item(item_id).await?.data;
          self.db.upsert_items(std::slice::from_ref(&item))?;
        }
        if self.db.add_favorite(user.id, item_id)? {
          Ok(format!("Added #{} to favorites.\n", item_id))
        } else {
          Ok(format!("#{} is already a favorite.\n", item_id))
        }
      }
      FavoriteCommand::Remove { item_id } => {
        if self.db.remove_favorite(user.id, item_id)? {
          Ok(format!("Removed #{} from favorites.\n", item_id))
        } else {
          Ok(format!("#{} was not a favorite.\n", item_id))
        }
      }
      FavoriteCommand::List => Ok(render::items_table(&self.db.list_favorites(user.id)?)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::client::tests::client_for;
  use crate::api::client::GameClient;
  use crate::cache::{CacheBackend, CacheLayer, MemoryStorage, SqliteStorage, TieredStorage};
  use crate::config::{ApiConfig, ImportConfig};
  use crate::db::catalog::tests::sample_listing;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn app_for(server: &MockServer) -> App {
    app_with(client_for(server, 50))
  }

  fn app_with(client: GameClient) -> App {
    let cache = CacheLayer::new(CacheBackend::Tiered(TieredStorage::new(
      MemoryStorage::new(),
      SqliteStorage::open_in_memory().unwrap(),
    )));
    let client = CachedGameClient::with_cache(client, cache);
    let mut config = Config::default();
    config.import.batch_delay_ms = 0;
    App::with_parts(
      config,
      Database::open_in_memory().unwrap(),
      client,
      "alice".to_string(),
    )
  }

  #[tokio::test]
  async fn test_profit_with_recorded_prices() {
    let server = MockServer::start().await;
    let mut app = app_for(&server);
    app.db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();

    app
      .run(Command::Price(PriceCommand::Set { id: 1, price: 10 }))
      .await
      .unwrap();
    app
      .run(Command::Price(PriceCommand::Set { id: 2, price: 20 }))
      .await
      .unwrap();
    app
      .run(Command::Price(PriceCommand::Set { id: 100, price: 1000 }))
      .await
      .unwrap();

    let out = app
      .run(Command::Profit {
        item_id: 100,
        sell: None,
        count: 1,
      })
      .await
      .unwrap();

    // 1000 - 2% tax - (3 * 10 + 20)
    assert!(out.contains("Profit:"));
    assert!(out.contains("930"));
    assert!(!out.contains("Missing prices"));
  }

  #[tokio::test]
  async fn test_profit_without_sell_price_is_error() {
    let server = MockServer::start().await;
    let mut app = app_for(&server);
    app.db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();

    let err = app
      .run(Command::Profit {
        item_id: 100,
        sell: None,
        count: 1,
      })
      .await
      .unwrap_err();
    assert!(err.to_string().contains("No sell price"));
  }

  #[tokio::test]
  async fn test_recipe_falls_back_to_api_and_is_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/recipes"))
      .and(query_param("resultId", "300"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "data": [{
          "resultId": 300,
          "resultName": { "en": "Ash Bow" },
          "jobId": 5,
          "ingredientIds": [12],
          "quantities": [4],
          "ingredients": [{ "id": 12, "name": { "en": "Ash" } }]
        }]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let mut app = app_for(&server);
    let out = app.run(Command::Recipe { item_id: 300 }).await.unwrap();
    assert!(out.contains("Ash Bow (#300)"));
    assert!(out.contains("4 x Ash (#12)"));

    // Second lookup is served from the local catalogue
    app.run(Command::Recipe { item_id: 300 }).await.unwrap();
    assert!(app.db.get_recipe(300).unwrap().is_some());

    let added = app
      .run(Command::Favorite(FavoriteCommand::Add { item_id: 300 }))
      .await
      .unwrap();
    assert!(added.contains("Added #300"));
    let again = app
      .run(Command::Favorite(FavoriteCommand::Add { item_id: 300 }))
      .await
      .unwrap();
    assert!(again.contains("already a favorite"));
  }

  #[tokio::test]
  async fn test_favorite_unknown_item_fetches_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/items/55"))
      .respond_with(
        ResponseTemplate::new(200).set_body_json(json!({ "id": 55, "name": { "en": "Oak Ring" } })),
      )
      .expect(1)
      .mount(&server)
      .await;

    let mut app = app_for(&server);
    app
      .run(Command::Favorite(FavoriteCommand::Add { item_id: 55 }))
      .await
      .unwrap();

    let list = app
      .run(Command::Favorite(FavoriteCommand::List))
      .await
      .unwrap();
    assert!(list.contains("Oak Ring"));

    let removed = app
      .run(Command::Favorite(FavoriteCommand::Remove { item_id: 55 }))
      .await
      .unwrap();
    assert!(removed.contains("Removed #55"));
  }

  #[tokio::test]
  async fn test_local_search_and_stats() {
    let server = MockServer::start().await;
    let mut app = app_for(&server);
    app.db.store_listing(&sample_listing(100, "Iron Sword")).unwrap();

    let out = app
      .run(Command::Search {
        query: "sword".to_string(),
        remote: false,
        limit: 20,
      })
      .await
      .unwrap();
    assert!(out.contains("Iron Sword"));

    let stats = app.run(Command::Stats).await.unwrap();
    assert!(stats.contains("recipes: 1"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_import_from_snapshot() {
    // Loading a snapshot never calls the API
    let api = ApiConfig {
      base_url: "http://127.0.0.1:9".to_string(),
      ..ApiConfig::default()
    };
    let mut app = app_with(GameClient::new(&api, &ImportConfig::default()).unwrap());
    app.config.import.batch_size = 1;
    app.config.import.batch_delay_ms = 60_000;

    let listing = sample_listing(100, "Iron Sword");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    Snapshot {
      items: vec![listing.result],
      materials: listing.materials,
      recipes: vec![listing.recipe],
      ..Snapshot::default()
    }
    .save(&path)
    .unwrap();

    let started = tokio::time::Instant::now();
    let out = app
      .run(Command::Import {
        jobs: Vec::new(),
        details: false,
        snapshot: None,
        from_snapshot: Some(path),
      })
      .await
      .unwrap();
    assert!(out.contains("1 recipes"));
    assert!(app.db.get_recipe(100).unwrap().is_some());
    // Several chunks, yet no pause between them
    assert_eq!(started.elapsed(), Duration::ZERO);
  }
}
