//! Admin form inputs
//!
//! Each input validates itself before any store call and renders the row
//! written on insert or the patch applied on update.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::catalog::derive::DEFAULT_ALL_TAG_COLOR;
use crate::types::{CatalogError, Result};

/// Rating shown on a new dish until edited
pub const DEFAULT_RATING: f64 = 4.5;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(CatalogError::InvalidInput(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// `#rrggbb`
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name_primary: String,
    #[serde(default)]
    pub name_secondary: String,
}

impl CategoryInput {
    pub fn validate(&self) -> Result<()> {
        require("Category name", &self.name_primary)
    }

    pub fn to_row(&self) -> JsonValue {
        json!({
            "name_primary": self.name_primary.trim(),
            "name_secondary": self.name_secondary.trim(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagInput {
    pub name: String,
    #[serde(default = "default_tag_color")]
    pub color: String,
}

fn default_tag_color() -> String {
    DEFAULT_ALL_TAG_COLOR.to_string()
}

impl Default for TagInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: default_tag_color(),
        }
    }
}

impl TagInput {
    pub fn validate(&self) -> Result<()> {
        require("Tag name", &self.name)?;
        if !is_hex_color(&self.color) {
            return Err(CatalogError::InvalidInput(format!(
                "Tag color must look like #rrggbb, got '{}'",
                self.color
            )));
        }
        Ok(())
    }

    pub fn to_row(&self) -> JsonValue {
        json!({
            "name": self.name.trim(),
            "color": self.color.to_lowercase(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DishInput {
    pub name_primary: String,
    pub name_secondary: String,
    pub description: String,
    pub price: f64,
    pub image_reference: String,
    pub category_id: Option<String>,
    pub rating: f64,
    pub is_available: bool,
    pub is_special: bool,
    /// Replaces the dish's tag associations on save
    pub tag_ids: Vec<String>,
}

impl Default for DishInput {
    fn default() -> Self {
        Self {
            name_primary: String::new(),
            name_secondary: String::new(),
            description: String::new(),
            price: 0.0,
            image_reference: String::new(),
            category_id: None,
            rating: DEFAULT_RATING,
            is_available: true,
            is_special: false,
            tag_ids: Vec::new(),
        }
    }
}

impl DishInput {
    pub fn validate(&self) -> Result<()> {
        require("Dish name", &self.name_primary)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(CatalogError::InvalidInput(format!(
                "Price must be zero or more, got {}",
                self.price
            )));
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(CatalogError::InvalidInput(format!(
                "Rating must be between 0 and 5, got {}",
                self.rating
            )));
        }
        Ok(())
    }

    /// Dish columns only; tags are written separately
    pub fn to_row(&self) -> JsonValue {
        let category_id = self
            .category_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        json!({
            "name_primary": self.name_primary.trim(),
            "name_secondary": self.name_secondary.trim(),
            "description": self.description,
            "price": self.price,
            "image_reference": self.image_reference,
            "category_id": category_id,
            "rating": self.rating,
            "is_available": self.is_available,
            "is_special": self.is_special,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferInput {
    pub title: String,
    pub description: Option<String>,
    pub image_reference: String,
    pub is_active: bool,
}

impl Default for OfferInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            image_reference: String::new(),
            is_active: true,
        }
    }
}

impl OfferInput {
    pub fn validate(&self) -> Result<()> {
        require("Offer title", &self.title)
    }

    pub fn to_row(&self) -> JsonValue {
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());

        json!({
            "title": self.title.trim(),
            "description": description,
            "image_reference": self.image_reference,
            "is_active": self.is_active,
        })
    }
}
