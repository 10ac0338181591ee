//! Crafting cost, profit and ROI.

use serde::Serialize;
use std::collections::HashMap;

use crate::api::types::RecipeListing;

/// Denominator for `tax_basis_points`.
const BASIS_POINTS: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct ProfitOptions {
  /// Number of crafts
  pub count: u32,
  /// Auction-house sale tax in hundredths of a percent
  pub tax_basis_points: u32,
}

impl Default for ProfitOptions {
  fn default() -> Self {
    Self {
      count: 1,
      tax_basis_points: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostLine {
  pub material_id: u64,
  pub name: String,
  /// Quantity across all crafts
  pub quantity: u64,
  pub unit_price: Option<u64>,
  pub cost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitReport {
  pub item_id: u64,
  pub count: u32,
  pub lines: Vec<CostLine>,
  pub total_cost: u64,
  pub gross_revenue: u64,
  pub tax: u64,
  pub net_revenue: u64,
  pub profit: i64,
  /// `None` when the total cost is zero
  pub roi_percent: Option<f64>,
  /// Materials without a price; they count as free
  pub missing_prices: Vec<u64>,
}

impl ProfitReport {
  pub fn is_complete(&self) -> bool {
    self.missing_prices.is_empty()
  }
}

/// Compute the profit of crafting `listing` and selling each result at `sell_price`.
pub fn compute(
  listing: &RecipeListing,
  prices: &HashMap<u64, u64>,
  sell_price: u64,
  options: ProfitOptions,
) -> ProfitReport {
  let count = u64::from(options.count);
  let mut missing_prices = Vec::new();

  let lines: Vec<CostLine> = listing
    .recipe
    .ingredients
    .iter()
    .map(|ingredient| {
      let name = listing
        .materials
        .iter()
        .find(|m| m.id == ingredient.material_id)
        .map(|m| m.name.clone())
        .unwrap_or_else(|| format!("#{}", ingredient.material_id));
      let quantity = u64::from(ingredient.quantity).saturating_mul(count);
      let unit_price = prices.get(&ingredient.material_id).copied();
      if unit_price.is_none() {
        missing_prices.push(ingredient.material_id);
      }
      CostLine {
        material_id: ingredient.material_id,
        name,
        quantity,
        unit_price,
        cost: unit_price.unwrap_or(0).saturating_mul(quantity),
      }
    })
    .collect();

  let total_cost = lines.iter().fold(0u64, |acc, l| acc.saturating_add(l.cost));
  let gross_revenue = sell_price.saturating_mul(count);
  // Never more than the revenue, whatever the rate
  let tax = u64::try_from(
    u128::from(gross_revenue) * u128::from(options.tax_basis_points) / u128::from(BASIS_POINTS),
  )
  .unwrap_or(u64::MAX)
  .min(gross_revenue);
  let net_revenue = gross_revenue.saturating_sub(tax);
  let profit = (i128::from(net_revenue) - i128::from(total_cost))
    .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
  let roi_percent = if total_cost == 0 {
    None
  } else {
    Some(profit as f64 / total_cost as f64 * 100.0)
  };

  ProfitReport {
    item_id: listing.recipe.result_item_id,
    count: options.count,
    lines,
    total_cost,
    gross_revenue,
    tax,
    net_revenue,
    profit,
    roi_percent,
    missing_prices,
  }
}
