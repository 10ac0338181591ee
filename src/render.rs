//! Plain-text rendering of command results.

use std::fmt::Write;

use crate::api::types::{Item, Job, RecipeListing};
use crate::cache::CacheSource;
use crate::db::models::{CatalogCounts, PriceEntry};
use crate::import::ImportReport;
use crate::profit::ProfitReport;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Group thousands: 1234567 -> "1 234 567"
pub fn format_amount(value: u64) -> String {
  let digits = value.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(' ');
    }
    out.push(c);
  }
  out
}

fn format_signed(value: i64) -> String {
  if value < 0 {
    format!("-{}", format_amount(value.unsigned_abs()))
  } else {
    format_amount(value as u64)
  }
}

pub fn source_label(source: CacheSource) -> &'static str {
  match source {
    CacheSource::Network => "live",
    CacheSource::CacheFresh => "cached",
    CacheSource::Offline => "stale cache, API unreachable",
  }
}

pub fn items_table(items: &[Item]) -> String {
  if items.is_empty() {
    return "No items found.\n".to_string();
  }

  let mut out = String::new();
  let _ = writeln!(out, "{:>8}  {:<40}  {:>5}  {}", "ID", "NAME", "LEVEL", "TYPE");
  for item in items {
    let _ = writeln!(
      out,
      "{:>8}  {:<40}  {:>5}  {}",
      item.id,
      truncate(&item.name, 40),
      item.level,
      item.type_name.as_deref().unwrap_or("-")
    );
  }
  out
}

pub fn recipe(listing: &RecipeListing) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{} (#{}), level {}",
    listing.result.name, listing.result.id, listing.recipe.level
  );
  for ingredient in &listing.recipe.ingredients {
    let name = listing
      .materials
      .iter()
      .find(|m| m.id == ingredient.material_id)
      .map(|m| m.name.as_str())
      .unwrap_or("?");
    let _ = writeln!(
      out,
      "  {:>4} x {} (#{})",
      ingredient.quantity, name, ingredient.material_id
    );
  }
  out
}

pub fn profit(report: &ProfitReport, item_name: &str) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "{} x{}", item_name, report.count);
  for line in &report.lines {
    let unit = line
      .unit_price
      .map(format_amount)
      .unwrap_or_else(|| "no price".to_string());
    let _ = writeln!(
      out,
      "  {:>6} x {:<32} @ {:>10} = {:>12}",
      line.quantity,
      truncate(&line.name, 32),
      unit,
      format_amount(line.cost)
    );
  }
  let _ = writeln!(out, "Cost:     {:>14}", format_amount(report.total_cost));
  let _ = writeln!(out, "Revenue:  {:>14}", format_amount(report.gross_revenue));
  let _ = writeln!(out, "Tax:      {:>14}", format_amount(report.tax));
  let _ = writeln!(out, "Profit:   {:>14}", format_signed(report.profit));
  match report.roi_percent {
    Some(roi) => {
      let _ = writeln!(out, "ROI:      {:>13.1}%", roi);
    }
    None => {
      let _ = writeln!(out, "ROI:      {:>14}", "n/a");
    }
  }
  if !report.is_complete() {
    let ids: Vec<String> = report.missing_prices.iter().map(|id| id.to_string()).collect();
    let _ = writeln!(out, "Missing prices for: {}", ids.join(", "));
  }
  out
}

pub fn prices(entries: &[(PriceEntry, Option<String>)]) -> String {
  if entries.is_empty() {
    return "No prices recorded.\n".to_string();
  }

  let mut out = String::new();
  for (entry, name) in entries {
    let _ = writeln!(
      out,
      "{:>8}  {:<40}  {:>12}  {}",
      entry.object_id,
      truncate(name.as_deref().unwrap_or("?"), 40),
      format_amount(entry.price),
      entry.recorded_at.format("%Y-%m-%d %H:%M")
    );
  }
  out
}

pub fn import_report(report: &ImportReport) -> String {
  let mut out = format!(
    "Imported {} jobs, {} items, {} materials, {} recipes.\n",
    report.jobs, report.items, report.materials, report.recipes
  );
  if !report.skipped_jobs.is_empty() {
    let ids: Vec<String> = report.skipped_jobs.iter().map(|id| id.to_string()).collect();
    let _ = writeln!(out, "Skipped jobs: {}", ids.join(", "));
  }
  if report.failed_chunks > 0 {
    let _ = writeln!(out, "Failed chunks: {}", report.failed_chunks);
  }
  if report.failed_details > 0 {
    let _ = writeln!(out, "Failed item details: {}", report.failed_details);
  }
  out
}

pub fn counts(counts: &CatalogCounts, jobs: &[Job]) -> String {
  let mut out = format!("jobs: {}\n", counts.jobs);
  for job in jobs {
    let _ = writeln!(out, "  {:>4}  {}", job.id, job.name);
  }
  let _ = write!(
    out,
    "items: {}\nmaterials: {}\nrecipes: {}\n",
    counts.items, counts.materials, counts.recipes
  );
  out
}
