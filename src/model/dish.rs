//! Dish record with its embedded category label and tags

use serde::{Deserialize, Serialize};

use super::serde_helpers::{bool_true, lenient_list, lenient_option, null_as_default, null_as_true};
use super::{require_text, CategoryLabel, Record, Tag};
use crate::store::Table;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub name_primary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name_secondary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub price: f64,
    /// Opaque image URL
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_reference: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: f64,
    #[serde(default = "bool_true", deserialize_with = "null_as_true")]
    pub is_available: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_special: bool,
    /// Embedded through `category_id`; `None` for a dangling reference
    #[serde(default, deserialize_with = "lenient_option")]
    pub category: Option<CategoryLabel>,
    /// Embedded through `dish_tags`
    #[serde(default, deserialize_with = "lenient_list")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Dish {
    /// Primary name of the embedded category
    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.name_primary.as_str())
    }

    /// Whether any tag carries `name`, ignoring case
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.is_named(name))
    }

    pub fn is_vegetarian(&self) -> bool {
        self.has_tag("veg")
    }

    pub fn is_spicy(&self) -> bool {
        self.has_tag("spicy")
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

impl Record for Dish {
    const TABLE: Table = Table::Dishes;

    fn validate(&self) -> Result<(), String> {
        require_text("id", &self.id)?;
        require_text("name_primary", &self.name_primary)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be a non-negative number, got {}", self.price));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_row_uses_defaults() {
        let dish = Dish::from_row(&json!({
            "id": "d1",
            "name_primary": "Dal Makhani",
            "price": 220,
        }))
        .unwrap();

        assert_eq!(dish.name_secondary, "");
        assert!(dish.is_available);
        assert!(!dish.is_special);
        assert_eq!(dish.category_name(), None);
        assert!(dish.tags.is_empty());
    }

    #[test]
    fn test_price_is_required() {
        assert!(Dish::from_row(&json!({ "id": "d1", "name_primary": "Lassi" })).is_err());
        assert!(Dish::from_row(&json!({ "id": "d1", "name_primary": "Lassi", "price": null })).is_err());
        assert!(Dish::from_row(&json!({ "id": "d1", "name_primary": "Lassi", "price": -5 })).is_err());
    }

    #[test]
    fn test_embeds_are_lenient() {
        let dish = Dish::from_row(&json!({
            "id": "d1",
            "name_primary": "Paneer Tikka",
            "price": 260.0,
            "category": null,
            "tags": [
                { "id": "t1", "name": "Veg", "color": "#22c55e" },
                null,
                { "id": "t2" },
                { "id": "t3", "name": "spicy", "color": "#ef4444" },
            ],
        }))
        .unwrap();

        assert_eq!(dish.category_name(), None);
        assert_eq!(dish.tag_names(), vec!["Veg", "spicy"]);
        assert!(dish.is_vegetarian());
        assert!(dish.is_spicy());
    }

    #[test]
    fn test_category_label() {
        let dish = Dish::from_row(&json!({
            "id": "d1",
            "name_primary": "Butter Naan",
            "price": 60,
            "category": { "name_primary": "Breads" },
        }))
        .unwrap();

        assert_eq!(dish.category_name(), Some("Breads"));
    }
}
