//! Configuration for the catalog service
//!
//! CLI arguments and environment variable handling using clap. Every flag
//! has an environment fallback so the binary can run from a `.env` file.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::catalog::derive::DEFAULT_ALL_TAG_COLOR;
use crate::catalog::MenuFilter;
use crate::store::nats::DEFAULT_SUBJECT_PREFIX;

/// Dhaba catalog - live menu catalog and admin tool
#[derive(Parser, Debug, Clone)]
#[command(name = "dhaba-catalog")]
#[command(about = "Live menu catalog and admin tool for the restaurant site")]
pub struct Args {
    /// Data store backend
    #[arg(long, env = "BACKEND", value_enum, default_value = "memory")]
    pub backend: Backend,

    /// JSON file seeding the in-memory backend
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "dhaba")]
    pub mongodb_db: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Subject prefix for change notifications
    #[arg(long, env = "CHANGE_SUBJECT_PREFIX", default_value = DEFAULT_SUBJECT_PREFIX)]
    pub change_subject_prefix: String,

    /// Enable development mode (missing NATS is tolerated)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Bound on each catalog fetch, in milliseconds
    #[arg(long, env = "FETCH_TIMEOUT_MS", default_value = "10000")]
    pub fetch_timeout_ms: u64,

    /// Badge color of the synthetic "All" tag
    #[arg(long, env = "ALL_TAG_COLOR", default_value = DEFAULT_ALL_TAG_COLOR)]
    pub all_tag_color: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// NATS connection configuration
#[derive(clap::Args, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-process store, optionally seeded from SEED_FILE
    Memory,
    /// MongoDB collections with NATS change notifications
    Mongo,
}

/// What the binary does once connected
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Mount the live catalog and log the menu whenever it changes (default)
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Load the catalog once and print the filtered menu as JSON
    Menu {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print dashboard counts
    Stats,

    /// Create a category
    AddCategory {
        #[arg(long)]
        name: String,
        /// Hindi name
        #[arg(long, default_value = "")]
        secondary: String,
    },

    /// Create a tag
    AddTag {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = DEFAULT_ALL_TAG_COLOR)]
        color: String,
    },

    /// Create a dish
    AddDish {
        #[arg(long)]
        name: String,
        /// Hindi name; suggested from the dictionary when omitted
        #[arg(long)]
        secondary: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        category_id: Option<String>,
        #[arg(long, default_value = "4.5")]
        rating: f64,
        /// Tag ids to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        special: bool,
    },

    /// Flip a dish's today's-special flag
    ToggleSpecial {
        id: String,
    },

    /// Flip an offer's active flag
    ToggleOffer {
        id: String,
    },

    /// Delete a row by id
    Delete {
        /// categories, tags, dishes or offers
        table: String,
        id: String,
    },
}

/// Menu filter selection
#[derive(clap::Args, Debug, Clone)]
pub struct FilterArgs {
    /// Category primary name (exact)
    #[arg(long, default_value = "All")]
    pub category: String,

    /// Tag name (any case)
    #[arg(long, default_value = "all")]
    pub tag: String,

    /// Free-text search
    #[arg(long, default_value = "")]
    pub search: String,
}

impl Default for FilterArgs {
    fn default() -> Self {
        Self {
            category: "All".to_string(),
            tag: "all".to_string(),
            search: String::new(),
        }
    }
}

impl FilterArgs {
    pub fn to_filter(&self) -> MenuFilter {
        MenuFilter::new()
            .category(self.category.clone())
            .tag(self.tag.clone())
            .search(self.search.clone())
    }
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_timeout_ms == 0 {
            return Err("FETCH_TIMEOUT_MS must be greater than zero".to_string());
        }

        if !crate::admin::input::is_hex_color(&self.all_tag_color) {
            return Err(format!(
                "ALL_TAG_COLOR must look like #rrggbb, got '{}'",
                self.all_tag_color
            ));
        }

        if self.change_subject_prefix.trim_matches('.').is_empty() {
            return Err("CHANGE_SUBJECT_PREFIX must not be empty".to_string());
        }

        if self.backend == Backend::Memory && self.seed_file.is_none() && !self.dev_mode {
            return Err("SEED_FILE is required for the memory backend outside dev mode".to_string());
        }

        Ok(())
    }
}
