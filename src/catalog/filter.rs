//! Menu filtering
//!
//! A dish is shown when it passes all three predicates:
//!
//! - category: "All", or the embedded category's primary name matches exactly
//! - tag: "all" (any case), or one of the dish's tags matches ignoring case
//! - search: empty, or a case-insensitive substring of either name or the
//!   description
//!
//! Results keep snapshot order.

use serde::{Deserialize, Serialize};

use super::derive::{ALL_CATEGORY, SENTINEL_ID};
use crate::model::Dish;

/// Current filter selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuFilter {
    pub category: String,
    pub tag: String,
    pub search: String,
}

impl Default for MenuFilter {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORY.to_string(),
            tag: SENTINEL_ID.to_string(),
            search: String::new(),
        }
    }
}

impl MenuFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a category by primary name
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Select a tag by name
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn matches(&self, dish: &Dish) -> bool {
        self.matches_category(dish) && self.matches_tag(dish) && self.matches_search(dish)
    }

    /// Dishes passing every predicate, in input order
    pub fn apply<'a>(&self, dishes: &'a [Dish]) -> Vec<&'a Dish> {
        dishes.iter().filter(|dish| self.matches(dish)).collect()
    }

    fn matches_category(&self, dish: &Dish) -> bool {
        self.category == ALL_CATEGORY || dish.category_name() == Some(self.category.as_str())
    }

    fn matches_tag(&self, dish: &Dish) -> bool {
        self.tag.to_lowercase() == SENTINEL_ID || dish.has_tag(&self.tag)
    }

    fn matches_search(&self, dish: &Dish) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        [&dish.name_secondary, &dish.name_primary, &dish.description]
            .into_iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// First dish flagged as a special, in current order
pub fn todays_special(dishes: &[Dish]) -> Option<&Dish> {
    dishes.iter().find(|dish| dish.is_special)
}

/// What the menu page renders for one filter selection
#[derive(Debug, Clone, PartialEq)]
pub struct MenuView {
    pub dishes: Vec<Dish>,
    pub special: Option<Dish>,
    /// Dishes in the snapshot before filtering
    pub total: usize,
    pub loading: bool,
}

impl MenuView {
    pub fn build(all: &[Dish], filter: &MenuFilter, loading: bool) -> Self {
        Self {
            dishes: filter.apply(all).into_iter().cloned().collect(),
            special: todays_special(all).cloned(),
            total: all.len(),
            loading,
        }
    }

    /// Placeholder text when nothing is shown; `None` while loading
    pub fn empty_message(&self) -> Option<&'static str> {
        if self.loading || !self.dishes.is_empty() {
            None
        } else if self.total == 0 {
            Some("No dishes available. Please add dishes through the admin panel.")
        } else {
            Some("No items found matching your search")
        }
    }
}
