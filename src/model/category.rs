use serde::{Deserialize, Serialize};

use super::serde_helpers::null_as_default;
use super::{require_text, Record};
use crate::store::Table;

/// Menu section such as "Starters" or "Thali"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name_primary: String,
    /// Hindi name shown under the primary one
    #[serde(default, deserialize_with = "null_as_default")]
    pub name_secondary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Category {
    /// View-only "All" entry; never persisted
    pub fn sentinel(id: &str, name_primary: &str, name_secondary: &str) -> Self {
        Self {
            id: id.to_string(),
            name_primary: name_primary.to_string(),
            name_secondary: name_secondary.to_string(),
            created_at: None,
        }
    }
}

impl Record for Category {
    const TABLE: Table = Table::Categories;

    fn validate(&self) -> Result<(), String> {
        require_text("id", &self.id)?;
        require_text("name_primary", &self.name_primary)
    }
}

/// The part of a category embedded into each dish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryLabel {
    pub name_primary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secondary_name_defaults_to_empty() {
        let category = Category::from_row(&json!({
            "id": "c1",
            "name_primary": "Breads",
            "name_secondary": null,
        }))
        .unwrap();

        assert_eq!(category.name_secondary, "");
        assert_eq!(category.created_at, None);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        assert!(Category::from_row(&json!({ "id": "c1", "name_primary": "  " })).is_err());
    }
}
