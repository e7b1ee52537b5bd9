//! Shared error type for the catalog crate

use thiserror::Error;

use crate::store::{StoreError, Table};

/// Crate-wide error
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A select against the external store failed or timed out
    #[error("Failed to load {table}: {reason}")]
    Fetch { table: Table, reason: String },

    /// An admin insert/update/delete failed
    #[error("Failed to save {table}: {reason}")]
    Mutation { table: Table, reason: String },

    /// A store row could not be turned into a typed record
    #[error("Invalid {table} record: {reason}")]
    InvalidRecord { table: Table, reason: String },

    /// Admin input rejected before reaching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Change feed registration or delivery failed
    #[error("Change feed error: {0}")]
    Feed(String),

    /// Misconfiguration detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    /// Wrap a store error raised while fetching `table`
    pub fn fetch(table: Table, err: impl std::fmt::Display) -> Self {
        Self::Fetch {
            table,
            reason: err.to_string(),
        }
    }

    /// Wrap a store error raised while mutating `table`
    pub fn mutation(table: Table, err: impl std::fmt::Display) -> Self {
        Self::Mutation {
            table,
            reason: err.to_string(),
        }
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
