use serde::{Deserialize, Serialize};

use super::serde_helpers::null_as_default;
use super::{require_text, Record};
use crate::store::Table;

/// Promotional banner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_reference: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Record for Offer {
    const TABLE: Table = Table::Offers;

    fn validate(&self) -> Result<(), String> {
        require_text("id", &self.id)?;
        require_text("title", &self.title)
    }
}
