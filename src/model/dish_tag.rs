use serde::{Deserialize, Serialize};

use super::{require_text, Record};
use crate::store::Table;

/// Association between a dish and a tag. Existence is all it encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DishTag {
    pub dish_id: String,
    pub tag_id: String,
}

impl DishTag {
    pub fn new(dish_id: impl Into<String>, tag_id: impl Into<String>) -> Self {
        Self {
            dish_id: dish_id.into(),
            tag_id: tag_id.into(),
        }
    }
}

impl Record for DishTag {
    const TABLE: Table = Table::DishTags;

    fn validate(&self) -> Result<(), String> {
        require_text("dish_id", &self.dish_id)?;
        require_text("tag_id", &self.tag_id)
    }
}
