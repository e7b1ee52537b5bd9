//! Filter option lists derived from fetched rows
//!
//! Categories and tags get a synthetic "All" entry that exists only in the
//! view. The two lists are treated differently: a stored category that
//! already means "all" suppresses the synthetic one, while the synthetic tag
//! is always prepended.

use crate::model::{Category, Tag};

/// Identifier shared by both synthetic entries
pub const SENTINEL_ID: &str = "all";

/// Primary name of the synthetic category
pub const ALL_CATEGORY: &str = "All";

/// Name of the synthetic tag
pub const ALL_TAG: &str = "All";

/// Secondary name of the synthetic category
pub const DEFAULT_ALL_SECONDARY: &str = "सभी";

/// Default badge color of the synthetic tag
pub const DEFAULT_ALL_TAG_COLOR: &str = "#10b981";

/// Whether a stored category already stands for "everything"
pub fn is_all_category(category: &Category, all_secondary: &str) -> bool {
    category.name_primary.to_lowercase() == "all" || category.name_secondary == all_secondary
}

/// Prepend the synthetic category unless the rows already have one
pub fn derive_categories(rows: Vec<Category>, all_secondary: &str) -> Vec<Category> {
    if rows.iter().any(|c| is_all_category(c, all_secondary)) {
        return rows;
    }

    let mut categories = Vec::with_capacity(rows.len() + 1);
    categories.push(Category::sentinel(SENTINEL_ID, ALL_CATEGORY, all_secondary));
    categories.extend(rows);
    categories
}

/// Always prepend the synthetic tag
pub fn derive_tags(rows: Vec<Tag>, all_color: &str) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(rows.len() + 1);
    tags.push(Tag::sentinel(SENTINEL_ID, ALL_TAG, all_color));
    tags.extend(rows);
    tags
}
