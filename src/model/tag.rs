use serde::{Deserialize, Serialize};

use super::serde_helpers::null_as_default;
use super::{require_text, Record};
use crate::store::Table;

/// Descriptive label such as "Veg" or "Spicy", also usable as a filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    /// Badge color, `#rrggbb`
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Tag {
    /// View-only "All" entry; never persisted
    pub fn sentinel(id: &str, name: &str, color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
            created_at: None,
        }
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Stored color, or `fallback` when the row has none
    pub fn display_color<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.color.is_empty() {
            fallback
        } else {
            &self.color
        }
    }
}

impl Record for Tag {
    const TABLE: Table = Table::Tags;

    fn validate(&self) -> Result<(), String> {
        require_text("id", &self.id)?;
        require_text("name", &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_named_ignores_case() {
        let tag = Tag::sentinel("t1", "Spicy", "#ef4444");
        assert!(tag.is_named("spicy"));
        assert!(tag.is_named("SPICY"));
        assert!(!tag.is_named("spice"));
    }

    #[test]
    fn test_display_color_fallback() {
        let plain = Tag::sentinel("t1", "Veg", "");
        assert_eq!(plain.display_color("#6b7280"), "#6b7280");

        let colored = Tag::sentinel("t2", "Veg", "#22c55e");
        assert_eq!(colored.display_color("#6b7280"), "#22c55e");
    }
}
