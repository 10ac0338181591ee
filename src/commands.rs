//! Command-line subcommands.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
  /// Import jobs, items and recipes from the game-data API
  Import {
    /// Only import these job ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    jobs: Vec<u64>,

    /// Also fetch the detail record of every crafted item
    #[arg(long)]
    details: bool,

    /// Write a JSON snapshot instead of the database
    #[arg(long, conflicts_with = "from_snapshot")]
    snapshot: Option<PathBuf>,

    /// Load a previously written snapshot into the database
    #[arg(long)]
    from_snapshot: Option<PathBuf>,
  },

  /// Search craftable items by name
  Search {
    query: String,

    /// Search the game-data API instead of the local catalogue
    #[arg(long)]
    remote: bool,

    #[arg(long, default_value_t = 20)]
    limit: u32,
  },

  /// Show the recipe of an item
  Recipe { item_id: u64 },

  /// Manage material and item prices
  #[command(subcommand)]
  Price(PriceCommand),

  /// Compute the profit of crafting an item
  Profit {
    item_id: u64,

    /// Auction-house sell price of one crafted item
    #[arg(long)]
    sell: Option<u64>,

    /// Number of crafts
    #[arg(long, default_value_t = 1)]
    count: u32,
  },

  /// Manage favorite items
  #[command(subcommand)]
  Favorite(FavoriteCommand),

  /// Manage the lookup cache
  #[command(subcommand)]
  Cache(CacheCommand),

  /// Show catalogue statistics
  Stats,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PriceCommand {
  /// Record the price of an item or material
  Set { id: u64, price: u64 },
  /// List recorded prices
  List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum FavoriteCommand {
  Add { item_id: u64 },
  Remove { item_id: u64 },
  List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheCommand {
  /// Drop every cached lookup
  Clear,
}
