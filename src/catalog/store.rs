//! Catalog Store
//!
//! In-memory mirror of the four public collections. Every refresh is a full
//! re-read of one table; the result replaces the previous collection
//! wholesale inside a `watch` channel so readers always see a consistent
//! snapshot.
//!
//! ```text
//! on_change(table)
//!   dishes | dish_tags ──► refresh_dishes
//!   categories ──────────► refresh_categories
//!   tags ────────────────► refresh_tags + refresh_dishes
//!   offers ──────────────► refresh_offers
//! ```
//!
//! Refreshes are never debounced or cancelled; the last one to complete
//! wins. Once [`CatalogStore::close`] is called, completions are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

use super::derive::{derive_categories, derive_tags, DEFAULT_ALL_SECONDARY, DEFAULT_ALL_TAG_COLOR};
use super::filter::{MenuFilter, MenuView};
use crate::config::Args;
use crate::model::{parse_rows, Category, Dish, Offer, Record, Tag};
use crate::notice::Notice;
use crate::store::{DataStore, Embed, Filter, Order, SelectQuery, StoreError, Table};
use crate::types::{CatalogError, Result};

/// Default bound on a single fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the notice channel; slow receivers lose the oldest notices
const NOTICE_CAPACITY: usize = 64;

// ============================================================================
// Configuration
// ============================================================================

/// Store-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Color of the synthetic "All" tag
    pub all_tag_color: String,
    /// Secondary name that marks a stored category as "All"
    pub all_category_secondary: String,
    pub fetch_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            all_tag_color: DEFAULT_ALL_TAG_COLOR.to_string(),
            all_category_secondary: DEFAULT_ALL_SECONDARY.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl CatalogConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            all_tag_color: args.all_tag_color.clone(),
            fetch_timeout: Duration::from_millis(args.fetch_timeout_ms),
            ..Self::default()
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Categories, oldest first
pub fn categories_query() -> SelectQuery {
    SelectQuery::new().order(Order::asc("created_at"))
}

/// Tags, oldest first
pub fn tags_query() -> SelectQuery {
    SelectQuery::new().order(Order::asc("created_at"))
}

/// Available dishes, newest first, with category label and tags
pub fn dishes_query() -> SelectQuery {
    SelectQuery::new()
        .filter(Filter::new().eq("is_available", true))
        .order(Order::desc("created_at"))
        .embed(Embed::Category)
        .embed(Embed::Tags)
}

/// Active offers, oldest first
pub fn offers_query() -> SelectQuery {
    SelectQuery::new()
        .filter(Filter::new().eq("is_active", true))
        .order(Order::asc("created_at"))
}

// ============================================================================
// Snapshot
// ============================================================================

/// Consistent view of every collection at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    /// Includes the synthetic "All" entry when the store has none
    pub categories: Arc<Vec<Category>>,
    /// Always starts with the synthetic "All" entry once loaded
    pub tags: Arc<Vec<Tag>>,
    pub dishes: Arc<Vec<Dish>>,
    pub offers: Arc<Vec<Offer>>,
    /// True until the first dishes fetch settles
    pub loading: bool,
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            categories: Arc::default(),
            tags: Arc::default(),
            dishes: Arc::default(),
            offers: Arc::default(),
            loading: true,
        }
    }
}

impl CatalogSnapshot {
    /// Apply a filter selection to the current dishes
    pub fn menu(&self, filter: &MenuFilter) -> MenuView {
        MenuView::build(&self.dishes, filter, self.loading)
    }
}

// ============================================================================
// Store
// ============================================================================

pub struct CatalogStore {
    source: Arc<dyn DataStore>,
    config: CatalogConfig,
    snapshot: watch::Sender<CatalogSnapshot>,
    notices: broadcast::Sender<Notice>,
    alive: AtomicBool,
}

impl CatalogStore {
    pub fn new(source: Arc<dyn DataStore>, config: CatalogConfig) -> Self {
        let (snapshot, _) = watch::channel(CatalogSnapshot::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            source,
            config,
            snapshot,
            notices,
            alive: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Fetch every collection concurrently
    ///
    /// Each failing collection keeps its previous contents and publishes an
    /// error notice. Returns the first failure, after all fetches settle.
    pub async fn load_all(&self) -> Result<()> {
        let (categories, dishes, tags, offers) = tokio::join!(
            self.refresh_categories(),
            self.refresh_dishes(),
            self.refresh_tags(),
            self.refresh_offers(),
        );

        let result = categories.and(dishes).and(tags).and(offers);
        if result.is_ok() {
            let snapshot = self.snapshot.borrow();
            info!(
                categories = snapshot.categories.len(),
                dishes = snapshot.dishes.len(),
                tags = snapshot.tags.len(),
                offers = snapshot.offers.len(),
                "Catalog loaded"
            );
        }
        result
    }

    pub async fn refresh_categories(&self) -> Result<()> {
        let result = self
            .fetch::<Category>(Table::Categories, categories_query())
            .await
            .map(|rows| derive_categories(rows, &self.config.all_category_secondary));
        self.apply(Table::Categories, result, |snapshot, categories| {
            snapshot.categories = Arc::new(categories);
        })
    }

    pub async fn refresh_tags(&self) -> Result<()> {
        let result = self
            .fetch::<Tag>(Table::Tags, tags_query())
            .await
            .map(|rows| derive_tags(rows, &self.config.all_tag_color));
        self.apply(Table::Tags, result, |snapshot, tags| {
            snapshot.tags = Arc::new(tags);
        })
    }

    pub async fn refresh_dishes(&self) -> Result<()> {
        let result = self.fetch::<Dish>(Table::Dishes, dishes_query()).await;
        self.apply(Table::Dishes, result, |snapshot, dishes| {
            snapshot.dishes = Arc::new(dishes);
        })
    }

    pub async fn refresh_offers(&self) -> Result<()> {
        let result = self.fetch::<Offer>(Table::Offers, offers_query()).await;
        self.apply(Table::Offers, result, |snapshot, offers| {
            snapshot.offers = Arc::new(offers);
        })
    }

    /// React to a change notification for `table`
    pub async fn on_change(&self, table: Table) -> Result<()> {
        if !self.is_alive() {
            debug!(%table, "Ignoring change for closed catalog");
            return Ok(());
        }

        debug!(%table, "Refreshing after change");
        match table {
            Table::Dishes | Table::DishTags => self.refresh_dishes().await,
            Table::Categories => self.refresh_categories().await,
            Table::Tags => {
                let (tags, dishes) = tokio::join!(self.refresh_tags(), self.refresh_dishes());
                tags.and(dishes)
            }
            Table::Offers => self.refresh_offers().await,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver woken whenever any collection is replaced
    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.snapshot.subscribe()
    }

    /// Receiver for user-facing notices
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub(crate) fn publish_notice(&self, notice: Notice) {
        // No receivers is fine
        let _ = self.notices.send(notice);
    }

    /// Stop accepting fetch results
    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn fetch<R: Record>(&self, table: Table, query: SelectQuery) -> Result<Vec<R>> {
        let timeout = self.config.fetch_timeout;
        let rows = tokio::time::timeout(timeout, self.source.select(table, &query))
            .await
            .map_err(|_| CatalogError::fetch(table, StoreError::Timeout(timeout)))?
            .map_err(|e| CatalogError::fetch(table, e))?;

        Ok(parse_rows(&rows))
    }

    /// Commit a fetch result, or report its failure, unless closed
    fn apply<T>(
        &self,
        table: Table,
        result: Result<T>,
        set: impl FnOnce(&mut CatalogSnapshot, T),
    ) -> Result<()> {
        if !self.is_alive() {
            debug!(%table, "Dropping fetch result for closed catalog");
            return Ok(());
        }

        let settles_loading = table == Table::Dishes;
        match result {
            Ok(value) => {
                self.snapshot.send_modify(|snapshot| {
                    set(snapshot, value);
                    if settles_loading {
                        snapshot.loading = false;
                    }
                });
                debug!(%table, "Collection replaced");
                Ok(())
            }
            Err(e) => {
                error!(%table, error = %e, "Fetch failed, keeping previous data");
                if settles_loading {
                    self.snapshot.send_if_modified(|snapshot| {
                        std::mem::replace(&mut snapshot.loading, false)
                    });
                }
                self.publish_notice(Notice::error(format!("Failed to load {}", table_label(table))));
                Err(e)
            }
        }
    }
}

fn table_label(table: Table) -> &'static str {
    match table {
        Table::DishTags => "dish tags",
        other => other.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn seeded() -> Arc<InMemoryStore> {
        let seed = json!({
            "categories": [{ "id": "c1", "name_primary": "Breads", "name_secondary": "रोटी" }],
            "tags": [
                { "id": "t2", "name": "Veg", "color": "#22c55e" },
                { "id": "t1", "name": "Spicy", "color": "#ef4444" },
            ],
            "dishes": [
                { "id": "d1", "name_primary": "Naan", "price": 40, "category_id": "c1" },
                { "id": "d2", "name_primary": "Kulcha", "price": 50, "is_available": false },
            ],
            "dish_tags": [{ "dish_id": "d1", "tag_id": "t2" }],
            "offers": [
                { "id": "o1", "title": "Thali Tuesday", "is_active": true },
                { "id": "o2", "title": "Old deal", "is_active": false },
            ],
        });
        Arc::new(InMemoryStore::from_seed(&seed).unwrap())
    }

    #[tokio::test]
    async fn test_load_all_populates_snapshot() {
        let catalog = CatalogStore::new(seeded(), CatalogConfig::default());
        assert!(catalog.snapshot().loading);

        catalog.load_all().await.unwrap();
        let snapshot = catalog.snapshot();

        assert!(!snapshot.loading);
        let categories: Vec<&str> = snapshot.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(categories, vec!["all", "c1"]);
        let tags: Vec<&str> = snapshot.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["All", "Veg", "Spicy"]);

        assert_eq!(snapshot.dishes.len(), 1);
        assert_eq!(snapshot.dishes[0].category_name(), Some("Breads"));
        assert!(snapshot.dishes[0].is_vegetarian());

        assert_eq!(snapshot.offers.len(), 1);
        assert_eq!(snapshot.offers[0].id, "o1");
    }

    #[tokio::test]
    async fn test_timeout_is_a_fetch_failure() {
        let store = seeded();
        store.hold_reads();
        let config = CatalogConfig {
            fetch_timeout: Duration::from_millis(20),
            ..CatalogConfig::default()
        };
        let catalog = CatalogStore::new(store, config);
        let mut notices = catalog.notices();

        let err = catalog.refresh_offers().await.unwrap_err();
        assert!(matches!(err, CatalogError::Fetch { table: Table::Offers, .. }));
        assert_eq!(notices.recv().await.unwrap(), Notice::error("Failed to load offers"));
    }

    #[tokio::test]
    async fn test_failed_dishes_fetch_settles_loading() {
        let store = seeded();
        store.fail_table(Table::Dishes, "permission denied");
        let catalog = CatalogStore::new(store, CatalogConfig::default());

        assert!(catalog.load_all().await.is_err());
        let snapshot = catalog.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.dishes.is_empty());
        assert_eq!(snapshot.offers.len(), 1);
    }
}
