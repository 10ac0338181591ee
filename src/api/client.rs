use crate::api::api_types::{ApiItem, ApiJob, ApiPage, ApiRecipe};
use crate::api::types::{Item, Job, RecipeListing};
use crate::config::{ApiConfig, ImportConfig};
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

/// Largest `$limit` the game-data API honours for one page.
pub const MAX_PAGE_LIMIT: u32 = 50;

/// Game-data API client
#[derive(Clone)]
pub struct GameClient {
  http: reqwest::Client,
  base_url: String,
  lang: String,
  page_limit: u32,
  max_pages: u32,
}

impl GameClient {
  pub fn new(api: &ApiConfig, import: &ImportConfig) -> Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(&api.user_agent)
      .timeout(api.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: api.base_url.trim_end_matches('/').to_string(),
      lang: api.lang.clone(),
      page_limit: import.page_limit.clamp(1, MAX_PAGE_LIMIT),
      max_pages: import.max_pages.max(1),
    })
  }

  pub fn lang(&self) -> &str {
    &self.lang
  }

  fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))
      .map_err(|e| eyre!("Invalid API url for {}: {}", path, e))?;
    {
      let mut pairs = url.query_pairs_mut();
      for (k, v) in query {
        pairs.append_pair(k, v);
      }
      pairs.append_pair("lang", &self.lang);
    }
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    debug!(%url, "GET");
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("{} returned status {}", url, status));
    }

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))
  }

  /// Fetch every row of a listing endpoint.
  ///
  /// Pages are requested with `$skip`/`$limit` until the API returns an
  /// empty page; `skip` advances by the number of rows actually received.
  pub async fn paginate<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    let mut skip = 0usize;
    let mut pages = 0u32;

    loop {
      let mut page_query = query.to_vec();
      page_query.push(("$skip", skip.to_string()));
      page_query.push(("$limit", self.page_limit.to_string()));

      let page: ApiPage<T> = self.get_json(self.url(path, &page_query)?).await?;
      if page.data.is_empty() {
        break;
      }

      debug!(path, skip, received = page.data.len(), total = ?page.total, "page");
      skip += page.data.len();
      rows.extend(page.data);
      pages += 1;

      if pages >= self.max_pages {
        warn!(path, pages, "stopping pagination at max_pages");
        break;
      }
    }

    Ok(rows)
  }

  /// List every job
  pub async fn list_jobs(&self) -> Result<Vec<Job>> {
    let jobs: Vec<ApiJob> = self.paginate("jobs", &[]).await?;
    Ok(jobs.into_iter().map(|j| j.into_job(&self.lang)).collect())
  }

  /// List a job's recipes.
  ///
  /// Malformed recipes are logged and dropped.
  pub async fn list_recipes(&self, job_id: u64) -> Result<Vec<RecipeListing>> {
    let recipes: Vec<ApiRecipe> = self
      .paginate("recipes", &[("jobId", job_id.to_string())])
      .await?;
    Ok(self.convert_recipes(recipes))
  }

  /// Get the recipe producing an item, if any
  pub async fn get_recipe(&self, item_id: u64) -> Result<Option<RecipeListing>> {
    let url = self.url(
      "recipes",
      &[("resultId", item_id.to_string()), ("$limit", "1".to_string())],
    )?;
    let page: ApiPage<ApiRecipe> = self.get_json(url).await?;
    Ok(self.convert_recipes(page.data).into_iter().next())
  }

  fn convert_recipes(&self, recipes: Vec<ApiRecipe>) -> Vec<RecipeListing> {
    recipes
      .into_iter()
      .filter_map(|r| match r.into_listing(&self.lang) {
        Ok(listing) => Some(listing),
        Err(reason) => {
          warn!(%reason, "skipping malformed recipe");
          None
        }
      })
      .collect()
  }

  /// Search items by name. Returns at most one page.
  pub async fn search_items(&self, query: &str, limit: u32) -> Result<Vec<Item>> {
    let url = self.url(
      "items",
      &[
        ("name", query.trim().to_string()),
        ("$limit", limit.clamp(1, MAX_PAGE_LIMIT).to_string()),
      ],
    )?;
    let page: ApiPage<ApiItem> = self.get_json(url).await?;
    Ok(
      page
        .data
        .into_iter()
        .map(|i| i.into_item(&self.lang))
        .collect(),
    )
  }

  /// Get a single item by id
  pub async fn get_item(&self, id: u64) -> Result<Item> {
    let url = self.url(&format!("items/{}", id), &[])?;
    let item: ApiItem = self
      .get_json(url)
      .await
      .map_err(|e| eyre!("Failed to get item {}: {}", id, e))?;
    Ok(item.into_item(&self.lang))
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  pub(crate) fn client_for(server: &MockServer, page_limit: u32) -> GameClient {
    let api = ApiConfig {
      base_url: server.uri(),
      ..ApiConfig::default()
    };
    let import = ImportConfig {
      page_limit,
      ..ImportConfig::default()
    };
    GameClient::new(&api, &import).unwrap()
  }

  fn page(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "total": 3, "data": data }))
  }

  #[tokio::test]
  async fn test_paginate_until_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/jobs"))
      .and(query_param("$skip", "0"))
      .respond_with(page(json!([
        { "id": 1, "name": { "en": "Lumberjack" } },
        { "id": 2, "name": { "en": "Smith" } }
      ])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/jobs"))
      .and(query_param("$skip", "2"))
      .respond_with(page(json!([{ "id": 3, "name": { "en": "Tailor" } }])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/jobs"))
      .and(query_param("$skip", "3"))
      .respond_with(page(json!([])))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server, 2);
    let jobs = client.list_jobs().await.unwrap();
    let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["Lumberjack", "Smith", "Tailor"]);
  }

  #[tokio::test]
  async fn test_page_limit_is_clamped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/jobs"))
      .and(query_param("$limit", "50"))
      .respond_with(page(json!([])))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server, 500);
    assert!(client.list_jobs().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_paginate_stops_at_max_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/jobs"))
      .respond_with(page(json!([{ "id": 1, "name": { "en": "Loop" } }])))
      .expect(3)
      .mount(&server)
      .await;

    let api = ApiConfig {
      base_url: server.uri(),
      ..ApiConfig::default()
    };
    let import = ImportConfig {
      page_limit: 1,
      max_pages: 3,
      ..ImportConfig::default()
    };
    let client = GameClient::new(&api, &import).unwrap();
    assert_eq!(client.list_jobs().await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/items/42"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let client = client_for(&server, 50);
    let err = client.get_item(42).await.unwrap_err();
    assert!(err.to_string().contains("404"));
  }

  #[tokio::test]
  async fn test_search_sends_name_and_lang() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/items"))
      .and(query_param("name", "ash bow"))
      .and(query_param("lang", "en"))
      .and(query_param("$limit", "10"))
      .respond_with(page(json!([
        { "id": 44, "name": { "en": "Ash Bow" }, "level": 8, "type": { "name": { "en": "Bow" } } }
      ])))
      .mount(&server)
      .await;

    let client = client_for(&server, 50);
    let items = client.search_items("  ash bow ", 10).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Ash Bow");
    assert_eq!(items[0].type_name.as_deref(), Some("Bow"));
  }

  #[tokio::test]
  async fn test_list_recipes_skips_malformed_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
      .and(path("/recipes"))
      .and(query_param("jobId", "11"))
      .and(query_param("$skip", "0"))
      .respond_with(page(json!([
        { "resultId": 1, "jobId": 11, "ingredientIds": [5], "quantities": [2] },
        { "resultId": 2, "jobId": 11, "ingredientIds": [5, 6], "quantities": [2] }
      ])))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/recipes"))
      .and(query_param("$skip", "2"))
      .respond_with(page(json!([])))
      .mount(&server)
      .await;

    let client = client_for(&server, 50);
    let recipes = client.list_recipes(11).await.unwrap();
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].recipe.result_item_id, 1);
  }
}
