//! In-memory store
//!
//! Implements both sides of the store contract over plain vectors. Every
//! successful mutation publishes a [`ChangeEvent`] to the subscribers of the
//! touched table, the way the hosted backend does.
//!
//! Used for development (`BACKEND=memory`, optionally seeded from JSON) and
//! as the store in tests. Tests additionally get:
//!
//! - `fail_table()` / `heal_table()` to make every call on a table fail
//! - `hold_reads()` / `release_reads()` to keep selects in flight
//! - `select_count()` to observe which tables were re-fetched

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{json, Value as JsonValue};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::debug;

use super::{
    prepare_insert, ChangeEvent, ChangeFeed, ChangeKind, DataStore, Embed, Filter, SelectQuery,
    StoreError, Subscription, SubscriptionId, Table,
};

/// Store backed by in-process vectors, one per table
pub struct InMemoryStore {
    tables: RwLock<HashMap<Table, Vec<JsonValue>>>,
    subscribers: DashMap<SubscriptionId, (Table, mpsc::UnboundedSender<ChangeEvent>)>,
    failing: DashMap<Table, String>,
    selects: DashMap<Table, usize>,
    read_gate: watch::Sender<bool>,
    /// Last assigned `created_at`, in micros, kept strictly increasing
    clock: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (read_gate, _) = watch::channel(true);
        Self {
            tables: RwLock::new(HashMap::new()),
            subscribers: DashMap::new(),
            failing: DashMap::new(),
            selects: DashMap::new(),
            read_gate,
            clock: AtomicI64::new(0),
        }
    }

    /// Create a store from a seed document
    ///
    /// The seed is an object keyed by table name, each holding an array of
    /// rows: `{ "categories": [...], "dishes": [...] }`. Unknown keys are
    /// rejected. No change events are published for seeded rows.
    pub fn from_seed(seed: &JsonValue) -> Result<Self, StoreError> {
        let mut store = Self::new();
        let Some(object) = seed.as_object() else {
            return Err(StoreError::Connection("seed must be a JSON object".into()));
        };

        let mut tables = HashMap::new();
        for (name, rows) in object {
            let table: Table = name.parse().map_err(StoreError::Connection)?;
            let rows = rows
                .as_array()
                .ok_or_else(|| StoreError::Connection(format!("seed for {table} must be an array")))?;

            let prepared = rows
                .iter()
                .cloned()
                .map(|row| prepare_insert(table, row, || store.next_timestamp()).map(JsonValue::Object))
                .collect::<Result<Vec<_>, _>>()?;
            tables.insert(table, prepared);
        }

        store.tables = RwLock::new(tables);
        Ok(store)
    }

    /// Make every read and write on `table` fail until healed
    pub fn fail_table(&self, table: Table, reason: impl Into<String>) {
        self.failing.insert(table, reason.into());
    }

    pub fn heal_table(&self, table: Table) {
        self.failing.remove(&table);
    }

    /// Keep selects suspended (after they are counted) until released
    pub fn hold_reads(&self) {
        self.read_gate.send_replace(false);
    }

    pub fn release_reads(&self) {
        self.read_gate.send_replace(true);
    }

    /// Number of selects issued against `table`
    pub fn select_count(&self, table: Table) -> usize {
        self.selects.get(&table).map(|count| *count).unwrap_or(0)
    }

    /// Number of selects issued against any table
    pub fn total_selects(&self) -> usize {
        self.selects.iter().map(|entry| *entry.value()).sum()
    }

    pub fn reset_select_counts(&self) {
        self.selects.clear();
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn injected_failure(&self, table: Table) -> Option<String> {
        self.failing.get(&table).map(|reason| reason.clone())
    }

    fn check_write(&self, table: Table) -> Result<(), StoreError> {
        match self.injected_failure(table) {
            Some(reason) => Err(StoreError::Write { table, reason }),
            None => Ok(()),
        }
    }

    /// Publish a change event without touching any row
    pub fn emit(&self, table: Table, kind: ChangeKind) {
        self.notify(table, kind);
    }

    fn notify(&self, table: Table, kind: ChangeKind) {
        let event = ChangeEvent { table, kind };
        self.subscribers.retain(|id, (subscribed, sender)| {
            if *subscribed != table {
                return true;
            }
            let delivered = sender.send(event).is_ok();
            if !delivered {
                debug!(subscription = %id, "Dropping closed subscription");
            }
            delivered
        });
    }

    fn next_timestamp(&self) -> String {
        let now = Utc::now().timestamp_micros();
        let mut previous = self.clock.load(Ordering::Relaxed);
        loop {
            let next = now.max(previous + 1);
            match self
                .clock
                .compare_exchange(previous, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => {
                    return DateTime::<Utc>::from_timestamp_micros(next)
                        .unwrap_or_default()
                        .to_rfc3339_opts(SecondsFormat::Micros, true);
                }
                Err(actual) => previous = actual,
            }
        }
    }

    fn embed_rows(tables: &HashMap<Table, Vec<JsonValue>>, rows: &mut [JsonValue], embeds: &[Embed]) {
        let empty = Vec::new();
        let categories = tables.get(&Table::Categories).unwrap_or(&empty);
        let tags = tables.get(&Table::Tags).unwrap_or(&empty);
        let links = tables.get(&Table::DishTags).unwrap_or(&empty);

        for row in rows.iter_mut() {
            let Some(object) = row.as_object_mut() else {
                continue;
            };

            for embed in embeds {
                match embed {
                    Embed::Category => {
                        let category = object
                            .get("category_id")
                            .and_then(|id| categories.iter().find(|c| c.get("id") == Some(id)))
                            .map(|c| json!({ "name_primary": c.get("name_primary") }))
                            .unwrap_or(JsonValue::Null);
                        object.insert("category".into(), category);
                    }
                    Embed::Tags => {
                        let dish_id = object.get("id").cloned();
                        let tag_ids: Vec<&JsonValue> = links
                            .iter()
                            .filter(|link| link.get("dish_id") == dish_id.as_ref())
                            .filter_map(|link| link.get("tag_id"))
                            .collect();
                        let embedded: Vec<JsonValue> = tags
                            .iter()
                            .filter(|tag| tag.get("id").is_some_and(|id| tag_ids.contains(&id)))
                            .map(|tag| {
                                json!({
                                    "id": tag.get("id"),
                                    "name": tag.get("name"),
                                    "color": tag.get("color"),
                                })
                            })
                            .collect();
                        object.insert("tags".into(), JsonValue::Array(embedded));
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl DataStore for InMemoryStore {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<JsonValue>, StoreError> {
        *self.selects.entry(table).or_insert(0) += 1;

        let mut gate = self.read_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if let Some(reason) = self.injected_failure(table) {
            return Err(StoreError::Query { table, reason });
        }

        let tables = self.tables.read().await;
        let mut rows: Vec<JsonValue> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(ref order) = query.order {
            rows.sort_by(|a, b| order.compare(a, b));
        }

        if !query.embed.is_empty() {
            Self::embed_rows(&tables, &mut rows, &query.embed);
        }

        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<JsonValue>) -> Result<Vec<JsonValue>, StoreError> {
        self.check_write(table)?;
        let prepared = rows
            .into_iter()
            .map(|row| prepare_insert(table, row, || self.next_timestamp()).map(JsonValue::Object))
            .collect::<Result<Vec<_>, _>>()?;

        if prepared.is_empty() {
            return Ok(prepared);
        }

        self.tables
            .write()
            .await
            .entry(table)
            .or_default()
            .extend(prepared.iter().cloned());

        self.notify(table, ChangeKind::Insert);
        Ok(prepared)
    }

    async fn update(&self, table: Table, filter: &Filter, patch: JsonValue) -> Result<u64, StoreError> {
        self.check_write(table)?;
        let JsonValue::Object(patch) = patch else {
            return Err(StoreError::NotAnObject(table));
        };

        let mut matched = 0;
        {
            let mut tables = self.tables.write().await;
            for row in tables.entry(table).or_default().iter_mut() {
                if !filter.matches(row) {
                    continue;
                }
                if let Some(object) = row.as_object_mut() {
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                    matched += 1;
                }
            }
        }

        if matched > 0 {
            self.notify(table, ChangeKind::Update);
        }
        Ok(matched)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64, StoreError> {
        self.check_write(table)?;
        let (removed, cascaded) = {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table).or_default();

            let before = rows.len();
            let mut removed_ids = Vec::new();
            rows.retain(|row| {
                let keep = !filter.matches(row);
                if !keep {
                    removed_ids.extend(row.get("id").cloned());
                }
                keep
            });
            let removed = (before - rows.len()) as u64;

            // Association rows follow their dish or tag
            let link_column = match table {
                Table::Dishes => Some("dish_id"),
                Table::Tags => Some("tag_id"),
                _ => None,
            };
            let mut cascaded = 0;
            if let Some(column) = link_column {
                let links = tables.entry(Table::DishTags).or_default();
                let before = links.len();
                links.retain(|link| !link.get(column).is_some_and(|id| removed_ids.contains(id)));
                cascaded = before - links.len();
            }

            (removed, cascaded)
        };

        if removed > 0 {
            self.notify(table, ChangeKind::Delete);
        }
        if cascaded > 0 {
            self.notify(Table::DishTags, ChangeKind::Delete);
        }
        Ok(removed)
    }

    async fn count(&self, table: Table, filter: &Filter) -> Result<u64, StoreError> {
        if let Some(reason) = self.injected_failure(table) {
            return Err(StoreError::Query { table, reason });
        }
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).count() as u64)
            .unwrap_or(0))
    }
}

#[async_trait::async_trait]
impl ChangeFeed for InMemoryStore {
    async fn subscribe(&self, table: Table) -> Result<Subscription, StoreError> {
        let (sender, events) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        self.subscribers.insert(id, (table, sender));
        debug!(subscription = %id, %table, "Subscribed to table changes");

        Ok(Subscription { id, table, events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StoreError> {
        if self.subscribers.remove(&id).is_none() {
            debug!(subscription = %id, "Unsubscribe for unknown subscription");
        }
        Ok(())
    }
}
