//! Bulk import of jobs, items, materials and recipes from the game-data API.
//!
//! The pipeline lists every job, pages through each job's recipes,
//! deduplicates what it collected, optionally enriches result items with
//! their detail record, then hands everything to an [`ImportSink`] in
//! fixed-size chunks. Failures are per job, per item or per chunk: they are
//! logged, counted in the [`ImportReport`] and skipped.

mod sink;
mod snapshot;

pub use sink::{DatabaseSink, ImportSink, SnapshotSink};
pub use snapshot::Snapshot;

use color_eyre::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::api::client::GameClient;
use crate::api::types::{Item, Material, Recipe, RecipeListing};
use crate::config::ImportConfig;

#[derive(Debug, Clone)]
pub struct ImportOptions {
  /// Restrict the import to these jobs
  pub job_ids: Option<Vec<u64>>,
  /// Rows per write chunk and items per enrichment chunk
  pub batch_size: usize,
  /// Pause between chunks
  pub batch_delay: Duration,
  /// Fetch the detail record of every result item
  pub with_details: bool,
}

impl ImportOptions {
  pub fn from_config(config: &ImportConfig) -> Self {
    Self {
      job_ids: None,
      batch_size: config.batch_size.max(1),
      batch_delay: config.batch_delay(),
      with_details: false,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
  pub jobs: usize,
  pub recipes: usize,
  pub items: usize,
  pub materials: usize,
  /// Jobs whose recipe listing failed
  pub skipped_jobs: Vec<u64>,
  /// Chunks the sink rejected
  pub failed_chunks: usize,
  /// Items whose detail lookup failed
  pub failed_details: usize,
}

/// Deduplicated records gathered from the API.
#[derive(Debug, Default)]
struct Collected {
  items: BTreeMap<u64, Item>,
  materials: BTreeMap<u64, Material>,
  recipes: BTreeMap<u64, Recipe>,
}

impl Collected {
  fn add(&mut self, listing: RecipeListing) {
    let RecipeListing {
      recipe,
      result,
      materials,
    } = listing;

    self.recipes.entry(recipe.result_item_id).or_insert(recipe);
    self.items.entry(result.id).or_insert(result);
    for material in materials {
      match self.materials.get(&material.id) {
        // A placeholder is replaced by the first real record
        Some(existing) if !existing.name.starts_with('#') => {}
        _ => {
          self.materials.insert(material.id, material);
        }
      }
    }
  }
}

pub struct Importer<'a> {
  client: &'a GameClient,
}

impl<'a> Importer<'a> {
  pub fn new(client: &'a GameClient) -> Self {
    Self { client }
  }

  /// Run the full import into `sink`.
  ///
  /// Only a failure to list jobs aborts the run.
  pub async fn run<S: ImportSink>(
    &self,
    sink: &mut S,
    options: &ImportOptions,
  ) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    let mut jobs = self.client.list_jobs().await?;
    if let Some(wanted) = &options.job_ids {
      jobs.retain(|j| wanted.contains(&j.id));
    }
    info!(jobs = jobs.len(), "listing recipes");

    let mut collected = Collected::default();
    for job in &jobs {
      match self.client.list_recipes(job.id).await {
        Ok(listings) => {
          info!(job = %job.name, recipes = listings.len(), "job listed");
          for listing in listings {
            collected.add(listing);
          }
        }
        Err(e) => {
          warn!(job = job.id, error = %e, "skipping job");
          report.skipped_jobs.push(job.id);
        }
      }
    }

    if options.with_details {
      self.enrich(&mut collected, options, &mut report).await;
    }

    let snapshot = Snapshot {
      jobs,
      items: collected.items.into_values().collect(),
      materials: collected.materials.into_values().collect(),
      recipes: collected.recipes.into_values().collect(),
      ..Snapshot::default()
    };
    write_catalog(sink, &snapshot, options, &mut report).await?;

    Ok(report)
  }

  /// Replace listing data of result items with their detail record.
  async fn enrich(
    &self,
    collected: &mut Collected,
    options: &ImportOptions,
    report: &mut ImportReport,
  ) {
    let ids: Vec<u64> = collected.items.keys().copied().collect();
    info!(items = ids.len(), "fetching item details");

    let client = self.client;
    let details = fetch_in_chunks(&ids, options, |id| client.get_item(id)).await;
    for (id, result) in details {
      match result {
        Ok(detail) => {
          if let Some(item) = collected.items.get_mut(&id) {
            item.level = detail.level;
            item.type_name = detail.type_name.or(item.type_name.take());
            item.icon_id = detail.icon_id.or(item.icon_id);
            if !detail.name.is_empty() {
              item.name = detail.name;
            }
          }
        }
        Err(e) => {
          warn!(item = id, error = %e, "keeping listing data");
          report.failed_details += 1;
        }
      }
    }
  }
}

/// Fetch `ids` one chunk at a time, concurrently within a chunk, pausing
/// `batch_delay` between chunks. Results keep the order of `ids`.
async fn fetch_in_chunks<T, F, Fut>(
  ids: &[u64],
  options: &ImportOptions,
  fetch: F,
) -> Vec<(u64, Result<T>)>
where
  F: Fn(u64) -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut results = Vec::with_capacity(ids.len());
  for (index, chunk) in ids.chunks(options.batch_size.max(1)).enumerate() {
    if index > 0 && !options.batch_delay.is_zero() {
      tokio::time::sleep(options.batch_delay).await;
    }
    let fetched = join_all(chunk.iter().map(|id| fetch(*id))).await;
    results.extend(chunk.iter().copied().zip(fetched));
  }
  results
}

/// Write a catalogue into `sink` in chunks, jobs and items before recipes.
pub async fn write_catalog<S: ImportSink>(
  sink: &mut S,
  snapshot: &Snapshot,
  options: &ImportOptions,
  report: &mut ImportReport,
) -> Result<()> {
  let jobs = write_chunked("jobs", &snapshot.jobs, options, report, |c| {
    sink.write_jobs(c)
  })
  .await;
  report.jobs += jobs;
  let items = write_chunked("items", &snapshot.items, options, report, |c| {
    sink.write_items(c)
  })
  .await;
  report.items += items;
  let materials = write_chunked("materials", &snapshot.materials, options, report, |c| {
    sink.write_materials(c)
  })
  .await;
  report.materials += materials;
  let recipes = write_chunked("recipes", &snapshot.recipes, options, report, |c| {
    sink.write_recipes(c)
  })
  .await;
  report.recipes += recipes;

  sink.finish()?;
  info!(
    jobs = report.jobs,
    items = report.items,
    materials = report.materials,
    recipes = report.recipes,
    failed_chunks = report.failed_chunks,
    "import written"
  );
  Ok(())
}

async fn write_chunked<T, F>(
  label: &str,
  rows: &[T],
  options: &ImportOptions,
  report: &mut ImportReport,
  mut write: F,
) -> usize
where
  F: FnMut(&[T]) -> Result<usize>,
{
  let mut written = 0;
  for (index, chunk) in rows.chunks(options.batch_size.max(1)).enumerate() {
    if index > 0 && !options.batch_delay.is_zero() {
      tokio::time::sleep(options.batch_delay).await;
    }
    match write(chunk) {
      Ok(n) => written += n,
      Err(e) => {
        warn!(kind = label, chunk = index, rows = chunk.len(), error = %e, "skipping chunk");
        report.failed_chunks += 1;
      }
    }
  }
  written
}
