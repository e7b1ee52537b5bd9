//! External data store contract
//!
//! The catalog never talks to a concrete database. It reads through
//! [`DataStore`] and learns about changes through [`ChangeFeed`]:
//!
//! ```text
//! ┌──────────────┐ select/insert/update/delete ┌──────────────────────┐
//! │ CatalogStore │────────────────────────────►│ DataStore            │
//! │ AdminService │                             │  - InMemoryStore     │
//! └──────┬───────┘                             │  - MongoStore        │
//!        │ on_change(table)                    └──────────────────────┘
//! ┌──────┴─────────┐      subscribe(table)     ┌──────────────────────┐
//! │ ChangeListener │◄──────────────────────────│ ChangeFeed           │
//! └────────────────┘   ChangeEvent (no diff)   │  - InMemoryStore     │
//!                                              │  - NatsChangeFeed    │
//!                                              └──────────────────────┘
//! ```
//!
//! Rows cross this boundary as loosely-structured JSON objects. Typed
//! records are built from them in [`crate::model`].

pub mod memory;
pub mod mongo;
pub mod nats;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;
pub use nats::NatsChangeFeed;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

/// Failures reported by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A read failed (network, auth, permission)
    #[error("Query on {table} failed: {reason}")]
    Query { table: Table, reason: String },

    /// A write failed
    #[error("Write to {table} failed: {reason}")]
    Write { table: Table, reason: String },

    /// Rows must be JSON objects
    #[error("Row for {0} is not a JSON object")]
    NotAnObject(Table),

    /// The call did not complete in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Subscribing to or publishing change events failed
    #[error("Subscription failed: {0}")]
    Subscription(String),
}

// ============================================================================
// Tables
// ============================================================================

/// Tables the catalog reads from and listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Categories,
    Tags,
    Dishes,
    DishTags,
    Offers,
}

impl Table {
    /// Every table, in subscription order
    pub const ALL: [Table; 5] = [
        Table::Dishes,
        Table::Categories,
        Table::Tags,
        Table::DishTags,
        Table::Offers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Categories => "categories",
            Table::Tags => "tags",
            Table::Dishes => "dishes",
            Table::DishTags => "dish_tags",
            Table::Offers => "offers",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| format!("unknown table '{s}'"))
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Conjunction of equality conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, JsonValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match rows by identifier
    pub fn id(id: impl Into<String>) -> Self {
        Self::new().eq("id", id.into())
    }

    /// Require `column == value`
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, JsonValue)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate against a row. A missing column never matches.
    pub fn matches(&self, row: &JsonValue) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    /// Compare two rows on this order's column
    pub fn compare(&self, a: &JsonValue, b: &JsonValue) -> Ordering {
        let ordering = compare_values(a.get(&self.column), b.get(&self.column));
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Related rows to nest into each selected dish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embed {
    /// `category: { name_primary }` looked up through `category_id`
    Category,
    /// `tags: [{ id, name, color }]` looked up through `dish_tags`
    Tags,
}

/// Parameters of a `select`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filter: Filter,
    pub order: Option<Order>,
    pub embed: Vec<Embed>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        if !self.embed.contains(&embed) {
            self.embed.push(embed);
        }
        self
    }
}

fn compare_values(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::String(a)), Some(JsonValue::String(b))) => a.cmp(b),
        (Some(JsonValue::Number(a)), Some(JsonValue::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(JsonValue::Bool(a)), Some(JsonValue::Bool(b))) => a.cmp(b),
        (None | Some(JsonValue::Null), None | Some(JsonValue::Null)) => Ordering::Equal,
        (None | Some(JsonValue::Null), _) => Ordering::Less,
        (_, None | Some(JsonValue::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

// ============================================================================
// Change events
// ============================================================================

/// What happened to a table. Events never carry the changed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Unknown,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
            ChangeKind::Unknown => "unknown",
        }
    }

    /// Parse a wire payload; anything unrecognised is `Unknown`
    pub fn from_payload(payload: &[u8]) -> Self {
        match std::str::from_utf8(payload).map(str::trim) {
            Ok("insert") => ChangeKind::Insert,
            Ok("update") => ChangeKind::Update,
            Ok("delete") => ChangeKind::Delete,
            _ => ChangeKind::Unknown,
        }
    }
}

/// Notification that `table` changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

/// Handle identifying one registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live subscription. Events stop once the feed drops its sender.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub table: Table,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

// ============================================================================
// Traits
// ============================================================================

/// Request/response side of the external store
#[async_trait::async_trait]
pub trait DataStore: Send + Sync {
    /// Read the full contents of `table` matching `query`
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<JsonValue>, StoreError>;

    /// Insert rows, returning them as stored (with `id` and `created_at`)
    async fn insert(&self, table: Table, rows: Vec<JsonValue>) -> Result<Vec<JsonValue>, StoreError>;

    /// Merge `patch` into every matching row, returning the match count
    async fn update(&self, table: Table, filter: &Filter, patch: JsonValue) -> Result<u64, StoreError>;

    /// Delete matching rows, returning the number removed
    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64, StoreError>;

    /// Count matching rows
    async fn count(&self, table: Table, filter: &Filter) -> Result<u64, StoreError>;
}

/// Subscribe/notify side of the external store
#[async_trait::async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, table: Table) -> Result<Subscription, StoreError>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StoreError>;
}

// ============================================================================
// Row helpers
// ============================================================================

/// Current time in the format stored in `created_at`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Flag columns that queries filter on, with the value a row gets when it
/// leaves them out. Must agree with the record defaults in `crate::model`.
pub fn column_defaults(table: Table) -> &'static [(&'static str, bool)] {
    match table {
        Table::Dishes => &[("is_available", true), ("is_special", false)],
        Table::Offers => &[("is_active", false)],
        Table::Categories | Table::Tags | Table::DishTags => &[],
    }
}

/// Fill in `id`, `created_at` and missing flag columns for a row about to
/// be inserted
pub fn prepare_insert(
    table: Table,
    row: JsonValue,
    created_at: impl FnOnce() -> String,
) -> Result<Map<String, JsonValue>, StoreError> {
    let JsonValue::Object(mut object) = row else {
        return Err(StoreError::NotAnObject(table));
    };

    // Join rows are identified by their pair, not by an id
    if table != Table::DishTags {
        let has_id = matches!(object.get("id"), Some(JsonValue::String(id)) if !id.is_empty());
        if !has_id {
            object.insert("id".into(), JsonValue::String(Uuid::new_v4().to_string()));
        }
    }

    if !matches!(object.get("created_at"), Some(JsonValue::String(_))) {
        object.insert("created_at".into(), JsonValue::String(created_at()));
    }

    // Equality filters never match a missing or null column
    for &(column, default) in column_defaults(table) {
        if object.get(column).map_or(true, JsonValue::is_null) {
            object.insert(column.into(), JsonValue::Bool(default));
        }
    }

    Ok(object)
}
