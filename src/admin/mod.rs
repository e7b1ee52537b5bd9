//! Admin Service
//!
//! Content management for the menu: categories, tags, dishes with their tag
//! associations, today's specials and offers. Every mutation reports its
//! outcome as a [`Notice`]; the live catalog picks the change up through the
//! store's change feed, never from here.

pub mod input;
pub mod suggest;

pub use input::{CategoryInput, DishInput, OfferInput, TagInput};
pub use suggest::suggest_secondary_name;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::catalog::store::categories_query;
use crate::model::{parse_rows, Category, Dish, DishTag, Offer, Record, Tag};
use crate::notice::Notice;
use crate::store::{DataStore, Embed, Filter, Order, SelectQuery, StoreError, Table};
use crate::types::{CatalogError, Result};

/// Name of the category that can't be deleted
pub const PROTECTED_CATEGORY: &str = "All";

const NOTICE_CAPACITY: usize = 64;

/// Counts shown on the admin dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_dishes: u64,
    pub total_categories: u64,
    pub total_tags: u64,
    pub special_dishes: u64,
}

pub struct AdminService {
    store: Arc<dyn DataStore>,
    notices: broadcast::Sender<Notice>,
}

impl AdminService {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { store, notices }
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// Every stored category, oldest first
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.list(Table::Categories, categories_query(), "Failed to fetch categories")
            .await
    }

    /// Create a category, or update `existing_id`. Returns the id.
    pub async fn save_category(&self, existing_id: Option<&str>, input: &CategoryInput) -> Result<String> {
        self.check(input.validate())?;
        let result = self.save_row(Table::Categories, existing_id, input.to_row()).await;
        self.finish(
            Table::Categories,
            result,
            format!("Category {} successfully", verb(existing_id)),
            "Failed to save category",
        )
    }

    /// Delete a category. The category named "All" is refused.
    pub async fn delete_category(&self, id: &str, name: &str) -> Result<()> {
        if name == PROTECTED_CATEGORY {
            let message = "Cannot delete the 'All' category";
            self.notify(Notice::error(message));
            return Err(CatalogError::InvalidInput(message.to_string()));
        }

        let result = self.delete_by_id(Table::Categories, id).await;
        self.finish(
            Table::Categories,
            result,
            "Category deleted successfully".to_string(),
            "Failed to delete category",
        )
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Every stored tag, alphabetical. The public catalog keeps creation order.
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let query = SelectQuery::new().order(Order::asc("name"));
        self.list(Table::Tags, query, "Failed to fetch tags").await
    }

    pub async fn save_tag(&self, existing_id: Option<&str>, input: &TagInput) -> Result<String> {
        self.check(input.validate())?;
        let result = self.save_row(Table::Tags, existing_id, input.to_row()).await;
        self.finish(
            Table::Tags,
            result,
            format!("Tag {} successfully", verb(existing_id)),
            "Failed to save tag",
        )
    }

    /// Delete a tag and its dish associations
    pub async fn delete_tag(&self, id: &str) -> Result<()> {
        let result = self.delete_by_id(Table::Tags, id).await;
        self.finish(
            Table::Tags,
            result,
            "Tag deleted successfully".to_string(),
            "Failed to delete tag",
        )
    }

    // ========================================================================
    // Dishes
    // ========================================================================

    /// Every dish, available or not, newest first
    pub async fn list_dishes(&self) -> Result<Vec<Dish>> {
        self.list(Table::Dishes, admin_dishes_query(Filter::new()), "Failed to fetch dishes")
            .await
    }

    /// Create or update a dish, then replace its tag associations
    pub async fn save_dish(&self, existing_id: Option<&str>, input: &DishInput) -> Result<String> {
        self.check(input.validate())?;

        let result = match self.save_row(Table::Dishes, existing_id, input.to_row()).await {
            Ok(id) => self.replace_dish_tags(&id, &input.tag_ids).await.map(|()| id),
            Err(e) => Err(e),
        };

        self.finish(
            Table::Dishes,
            result,
            format!("Dish {} successfully", verb(existing_id)),
            "Failed to save dish",
        )
    }

    /// Delete a dish and its tag associations
    pub async fn delete_dish(&self, id: &str) -> Result<()> {
        let result = self.delete_by_id(Table::Dishes, id).await;
        self.finish(
            Table::Dishes,
            result,
            "Dish deleted successfully".to_string(),
            "Failed to delete dish",
        )
    }

    async fn replace_dish_tags(&self, dish_id: &str, tag_ids: &[String]) -> std::result::Result<(), StoreError> {
        self.store
            .delete(Table::DishTags, &Filter::new().eq("dish_id", dish_id))
            .await?;

        let mut links: Vec<DishTag> = Vec::with_capacity(tag_ids.len());
        for tag_id in tag_ids {
            let link = DishTag::new(dish_id, tag_id.as_str());
            if !links.contains(&link) {
                links.push(link);
            }
        }
        if links.is_empty() {
            return Ok(());
        }

        let rows = links
            .iter()
            .map(|link| json!({ "dish_id": link.dish_id, "tag_id": link.tag_id }))
            .collect();
        self.store.insert(Table::DishTags, rows).await?;
        Ok(())
    }

    // ========================================================================
    // Specials
    // ========================================================================

    /// Dishes currently flagged as today's special, newest first
    pub async fn list_specials(&self) -> Result<Vec<Dish>> {
        self.list(
            Table::Dishes,
            admin_dishes_query(Filter::new().eq("is_special", true)),
            "Failed to fetch dishes",
        )
        .await
    }

    /// Flip a dish's special flag. Returns the new value.
    pub async fn toggle_special(&self, id: &str, currently_special: bool) -> Result<bool> {
        let special = !currently_special;
        self.set_special(id, special).await?;
        Ok(special)
    }

    pub async fn set_special(&self, id: &str, special: bool) -> Result<()> {
        let result = self.update_by_id(Table::Dishes, id, json!({ "is_special": special })).await;
        let success = if special {
            "Dish added to today's specials"
        } else {
            "Dish removed from today's specials"
        };
        self.finish(Table::Dishes, result, success.to_string(), "Failed to update dish")
    }

    // ========================================================================
    // Offers
    // ========================================================================

    /// Every offer, active or not, oldest first
    pub async fn list_offers(&self) -> Result<Vec<Offer>> {
        self.list(
            Table::Offers,
            SelectQuery::new().order(Order::asc("created_at")),
            "Failed to load offers",
        )
        .await
    }

    pub async fn save_offer(&self, existing_id: Option<&str>, input: &OfferInput) -> Result<String> {
        self.check(input.validate())?;
        let result = self.save_row(Table::Offers, existing_id, input.to_row()).await;
        self.finish(
            Table::Offers,
            result,
            format!("Offer {} successfully", verb(existing_id)),
            "Failed to save offer",
        )
    }

    pub async fn delete_offer(&self, id: &str) -> Result<()> {
        let result = self.delete_by_id(Table::Offers, id).await;
        self.finish(
            Table::Offers,
            result,
            "Offer deleted successfully".to_string(),
            "Failed to delete offer",
        )
    }

    /// Flip an offer's active flag. Returns the new value.
    pub async fn toggle_offer(&self, id: &str, currently_active: bool) -> Result<bool> {
        let active = !currently_active;
        self.set_offer_active(id, active).await?;
        Ok(active)
    }

    pub async fn set_offer_active(&self, id: &str, active: bool) -> Result<()> {
        let result = self.update_by_id(Table::Offers, id, json!({ "is_active": active })).await;
        let success = format!(
            "Offer {} successfully",
            if active { "activated" } else { "deactivated" }
        );
        self.finish(Table::Offers, result, success, "Failed to update offer status")
    }

    // ========================================================================
    // Dashboard
    // ========================================================================

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let all = Filter::new();
        let specials = Filter::new().eq("is_special", true);

        let (total_dishes, total_categories, total_tags, special_dishes) = tokio::try_join!(
            self.count(Table::Dishes, &all),
            self.count(Table::Categories, &all),
            self.count(Table::Tags, &all),
            self.count(Table::Dishes, &specials),
        )?;

        Ok(DashboardStats {
            total_dishes,
            total_categories,
            total_tags,
            special_dishes,
        })
    }

    async fn count(&self, table: Table, filter: &Filter) -> Result<u64> {
        self.store.count(table, filter).await.map_err(|e| {
            error!(%table, error = %e, "Failed to count rows");
            CatalogError::fetch(table, e)
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn list<R: Record>(&self, table: Table, query: SelectQuery, failure: &str) -> Result<Vec<R>> {
        match self.store.select(table, &query).await {
            Ok(rows) => Ok(parse_rows(&rows)),
            Err(e) => {
                error!(%table, error = %e, "Admin fetch failed");
                self.notify(Notice::error(failure));
                Err(CatalogError::fetch(table, e))
            }
        }
    }

    /// Report invalid input before touching the store
    fn check(&self, validation: Result<()>) -> Result<()> {
        if let Err(ref e) = validation {
            let message = match e {
                CatalogError::InvalidInput(message) => message.clone(),
                other => other.to_string(),
            };
            self.notify(Notice::error(message));
        }
        validation
    }

    async fn save_row(
        &self,
        table: Table,
        existing_id: Option<&str>,
        row: JsonValue,
    ) -> std::result::Result<String, StoreError> {
        match existing_id {
            Some(id) => {
                self.update_by_id(table, id, row).await?;
                Ok(id.to_string())
            }
            None => {
                let stored = self.store.insert(table, vec![row]).await?;
                stored
                    .first()
                    .and_then(|row| row.get("id"))
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::Write {
                        table,
                        reason: "insert returned no id".to_string(),
                    })
            }
        }
    }

    async fn update_by_id(
        &self,
        table: Table,
        id: &str,
        patch: JsonValue,
    ) -> std::result::Result<(), StoreError> {
        let matched = self.store.update(table, &Filter::id(id), patch).await?;
        if matched == 0 {
            return Err(StoreError::Write {
                table,
                reason: format!("no row with id '{}'", id),
            });
        }
        Ok(())
    }

    async fn delete_by_id(&self, table: Table, id: &str) -> std::result::Result<(), StoreError> {
        self.store.delete(table, &Filter::id(id)).await.map(|_| ())
    }

    /// Turn a store outcome into a notice and a crate result
    fn finish<T>(
        &self,
        table: Table,
        result: std::result::Result<T, StoreError>,
        success: String,
        failure: &str,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                info!(%table, "{}", success);
                self.notify(Notice::success(success));
                Ok(value)
            }
            Err(e) => {
                error!(%table, error = %e, "{}", failure);
                self.notify(Notice::error(failure));
                Err(CatalogError::mutation(table, e))
            }
        }
    }
}

/// Dishes with category label and tags, newest first
fn admin_dishes_query(filter: Filter) -> SelectQuery {
    SelectQuery::new()
        .filter(filter)
        .order(Order::desc("created_at"))
        .embed(Embed::Category)
        .embed(Embed::Tags)
}

fn verb(existing_id: Option<&str>) -> &'static str {
    if existing_id.is_some() {
        "updated"
    } else {
        "created"
    }
}
