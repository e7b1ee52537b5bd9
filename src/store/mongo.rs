//! MongoDB-backed store
//!
//! One collection per [`Table`]. Documents carry a uuid `id` string next to
//! Mongo's own `_id`, which never leaves this module. Embedded relations are
//! resolved with `$lookup` so a dish select is still a single round trip.
//!
//! MongoDB has no built-in per-table notification the catalog can rely on
//! without a replica set, so successful writes are announced through an
//! optional [`NatsChangeFeed`].

use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::{Client, Collection, IndexModel};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use super::{
    now_timestamp, prepare_insert, ChangeKind, DataStore, Embed, Filter, NatsChangeFeed, Order,
    SelectQuery, StoreError, Table,
};

/// MongoDB client bound to one database
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db_name: String,
    notifier: Option<NatsChangeFeed>,
}

impl MongoStore {
    /// Connect and verify the connection with a ping
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Connection(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
            notifier: None,
        })
    }

    /// Announce successful writes on `feed`
    pub fn with_notifier(mut self, feed: NatsChangeFeed) -> Self {
        self.notifier = Some(feed);
        self
    }

    fn collection(&self, table: Table) -> Collection<Document> {
        self.client.database(&self.db_name).collection(table.as_str())
    }

    /// Create the indexes the catalog queries rely on
    pub async fn apply_indexes(&self) -> Result<(), StoreError> {
        for table in Table::ALL {
            let indexes: Vec<IndexModel> = table_indexes(table)
                .into_iter()
                .map(|keys| IndexModel::builder().keys(keys).build())
                .collect();

            self.collection(table)
                .create_indexes(indexes)
                .await
                .map_err(|e| StoreError::Write {
                    table,
                    reason: format!("Failed to create indexes: {}", e),
                })?;
        }
        Ok(())
    }

    async fn announce(&self, table: Table, kind: ChangeKind) {
        if let Some(ref notifier) = self.notifier {
            if let Err(e) = notifier.publish(table, kind).await {
                warn!(%table, error = %e, "Failed to announce change");
            }
        }
    }

    /// Ids of the rows matching `filter`, used to cascade deletes
    async fn matching_ids(&self, table: Table, filter: Document) -> Result<Vec<Bson>, StoreError> {
        let cursor = self
            .collection(table)
            .find(filter)
            .projection(doc! { "id": 1 })
            .await
            .map_err(|e| query_error(table, e))?;

        let docs: Vec<Document> = cursor.try_collect().await.map_err(|e| query_error(table, e))?;
        Ok(docs.into_iter().filter_map(|mut d| d.remove("id")).collect())
    }
}

#[async_trait::async_trait]
impl DataStore for MongoStore {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<JsonValue>, StoreError> {
        let filter = filter_document(table, &query.filter)?;
        let sort = query.order.as_ref().map(sort_document);

        let docs: Vec<Document> = if query.embed.is_empty() {
            let collection = self.collection(table);
            let mut find = collection.find(filter).projection(doc! { "_id": 0 });
            if let Some(sort) = sort {
                find = find.sort(sort);
            }
            let cursor = find.await.map_err(|e| query_error(table, e))?;
            cursor.try_collect().await.map_err(|e| query_error(table, e))?
        } else {
            let mut pipeline = vec![doc! { "$match": filter }];
            if let Some(sort) = sort {
                pipeline.push(doc! { "$sort": sort });
            }
            pipeline.extend(embed_pipeline(&query.embed));

            let cursor = self
                .collection(table)
                .aggregate(pipeline)
                .await
                .map_err(|e| query_error(table, e))?;
            cursor.try_collect().await.map_err(|e| query_error(table, e))?
        };

        Ok(docs.into_iter().map(into_json).collect())
    }

    async fn insert(&self, table: Table, rows: Vec<JsonValue>) -> Result<Vec<JsonValue>, StoreError> {
        let prepared = rows
            .into_iter()
            .map(|row| prepare_insert(table, row, now_timestamp).map(JsonValue::Object))
            .collect::<Result<Vec<_>, _>>()?;

        if prepared.is_empty() {
            return Ok(prepared);
        }

        let docs = prepared
            .iter()
            .map(|row| bson::to_document(row).map_err(|e| write_error(table, e)))
            .collect::<Result<Vec<_>, _>>()?;

        self.collection(table)
            .insert_many(docs)
            .await
            .map_err(|e| write_error(table, e))?;

        self.announce(table, ChangeKind::Insert).await;
        Ok(prepared)
    }

    async fn update(&self, table: Table, filter: &Filter, patch: JsonValue) -> Result<u64, StoreError> {
        if !patch.is_object() {
            return Err(StoreError::NotAnObject(table));
        }
        let patch = bson::to_document(&patch).map_err(|e| write_error(table, e))?;

        let result = self
            .collection(table)
            .update_many(filter_document(table, filter)?, doc! { "$set": patch })
            .await
            .map_err(|e| write_error(table, e))?;

        if result.matched_count > 0 {
            self.announce(table, ChangeKind::Update).await;
        }
        Ok(result.matched_count)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<u64, StoreError> {
        let filter = filter_document(table, filter)?;

        let link_column = match table {
            Table::Dishes => Some("dish_id"),
            Table::Tags => Some("tag_id"),
            _ => None,
        };
        let removed_ids = match link_column {
            Some(_) => self.matching_ids(table, filter.clone()).await?,
            None => Vec::new(),
        };

        let result = self
            .collection(table)
            .delete_many(filter)
            .await
            .map_err(|e| write_error(table, e))?;

        if let Some(column) = link_column.filter(|_| !removed_ids.is_empty()) {
            let links = self
                .collection(Table::DishTags)
                .delete_many(doc! { column: { "$in": removed_ids } })
                .await
                .map_err(|e| write_error(Table::DishTags, e))?;
            if links.deleted_count > 0 {
                self.announce(Table::DishTags, ChangeKind::Delete).await;
            }
        }

        if result.deleted_count > 0 {
            self.announce(table, ChangeKind::Delete).await;
        }
        Ok(result.deleted_count)
    }

    async fn count(&self, table: Table, filter: &Filter) -> Result<u64, StoreError> {
        self.collection(table)
            .count_documents(filter_document(table, filter)?)
            .await
            .map_err(|e| query_error(table, e))
    }
}

fn query_error(table: Table, err: impl std::fmt::Display) -> StoreError {
    StoreError::Query {
        table,
        reason: err.to_string(),
    }
}

fn write_error(table: Table, err: impl std::fmt::Display) -> StoreError {
    StoreError::Write {
        table,
        reason: err.to_string(),
    }
}

/// Translate equality conditions into a Mongo filter document
fn filter_document(table: Table, filter: &Filter) -> Result<Document, StoreError> {
    let mut document = Document::new();
    for (column, value) in filter.conditions() {
        let value = bson::to_bson(value).map_err(|e| query_error(table, e))?;
        document.insert(column.clone(), value);
    }
    Ok(document)
}

/// Aggregation stages nesting the requested relations into each dish
fn embed_pipeline(embeds: &[Embed]) -> Vec<Document> {
    let mut stages = Vec::new();
    let mut hidden = doc! { "_id": 0 };

    for embed in embeds {
        match embed {
            Embed::Category => {
                stages.push(doc! {
                    "$lookup": {
                        "from": Table::Categories.as_str(),
                        "localField": "category_id",
                        "foreignField": "id",
                        "pipeline": [ { "$project": { "_id": 0, "name_primary": 1 } } ],
                        "as": "category",
                    }
                });
                stages.push(doc! {
                    "$set": { "category": { "$ifNull": [ { "$first": "$category" }, Bson::Null ] } }
                });
            }
            Embed::Tags => {
                stages.push(doc! {
                    "$lookup": {
                        "from": Table::DishTags.as_str(),
                        "localField": "id",
                        "foreignField": "dish_id",
                        "as": "dish_tags",
                    }
                });
                stages.push(doc! {
                    "$lookup": {
                        "from": Table::Tags.as_str(),
                        "localField": "dish_tags.tag_id",
                        "foreignField": "id",
                        "pipeline": [ { "$project": { "_id": 0, "id": 1, "name": 1, "color": 1 } } ],
                        "as": "tags",
                    }
                });
                hidden.insert("dish_tags", 0);
            }
        }
    }

    stages.push(doc! { "$project": hidden });
    stages
}

fn sort_document(order: &Order) -> Document {
    let direction = if order.ascending { 1 } else { -1 };
    let mut sort = Document::new();
    sort.insert(order.column.clone(), direction);
    sort
}

fn table_indexes(table: Table) -> Vec<Document> {
    match table {
        Table::DishTags => vec![doc! { "dish_id": 1 }, doc! { "tag_id": 1 }],
        Table::Dishes => vec![
            doc! { "id": 1 },
            doc! { "is_available": 1, "created_at": -1 },
            doc! { "category_id": 1 },
        ],
        Table::Offers => vec![doc! { "id": 1 }, doc! { "is_active": 1, "created_at": 1 }],
        Table::Categories => vec![doc! { "id": 1 }, doc! { "created_at": 1 }],
        Table::Tags => vec![doc! { "id": 1 }, doc! { "created_at": 1 }, doc! { "name": 1 }],
    }
}

fn into_json(document: Document) -> JsonValue {
    Bson::Document(document).into_relaxed_extjson()
}
