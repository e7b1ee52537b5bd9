//! NATS change feed
//!
//! Each table maps to the subject `<prefix>.<table>`. The payload is the
//! change kind (`insert`, `update`, `delete`); subscribers only need to know
//! that the table changed, so no row data is ever published.

use std::sync::Arc;
use std::time::Duration;

use async_nats::{Client, ConnectOptions};
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{ChangeEvent, ChangeFeed, ChangeKind, StoreError, Subscription, SubscriptionId, Table};
use crate::config::NatsArgs;

/// Default subject prefix for change notifications
pub const DEFAULT_SUBJECT_PREFIX: &str = "catalog.changes";

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// Change feed over core NATS subjects
#[derive(Clone)]
pub struct NatsChangeFeed {
    client: Client,
    prefix: String,
    forwarders: Arc<DashMap<SubscriptionId, JoinHandle<()>>>,
}

impl NatsChangeFeed {
    /// Connect to NATS. Fails fast when the server is unreachable.
    pub async fn connect(args: &NatsArgs, name: &str, prefix: &str) -> Result<Self, StoreError> {
        info!("Connecting to NATS at {}", args.nats_url);

        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self::from_client(client, prefix))
    }

    /// Wrap an existing connection
    pub fn from_client(client: Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.trim_end_matches('.').to_string(),
            forwarders: Arc::new(DashMap::new()),
        }
    }

    /// Subject carrying notifications for `table`
    pub fn subject(&self, table: Table) -> String {
        format!("{}.{}", self.prefix, table)
    }

    /// Announce that `table` changed
    pub async fn publish(&self, table: Table, kind: ChangeKind) -> Result<(), StoreError> {
        self.client
            .publish(self.subject(table), Bytes::from_static(kind.as_str().as_bytes()))
            .await
            .map_err(|e| StoreError::Subscription(format!("Publish failed: {}", e)))
    }

    /// Number of live forwarding tasks
    pub fn active_subscriptions(&self) -> usize {
        self.forwarders.len()
    }
}

#[async_trait::async_trait]
impl ChangeFeed for NatsChangeFeed {
    async fn subscribe(&self, table: Table) -> Result<Subscription, StoreError> {
        let subject = self.subject(table);
        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| StoreError::Subscription(format!("Subscribe to {} failed: {}", subject, e)))?;

        let id = SubscriptionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let payloads = subscriber.map(|message| message.payload);
        spawn_forwarder(self.forwarders.clone(), id, table, payloads, tx);

        debug!(%table, %id, "Subscribed to NATS changes");
        Ok(Subscription {
            id,
            table,
            events: rx,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), StoreError> {
        match self.forwarders.remove(&id) {
            // Aborting drops the NATS subscriber, which unsubscribes server-side
            Some((_, handle)) => handle.abort(),
            None => debug!(%id, "Unsubscribe for unknown subscription"),
        }
        Ok(())
    }
}

/// Forward change payloads into `tx` until the stream ends or the receiver
/// is dropped. The task deregisters itself from `forwarders` on exit.
fn spawn_forwarder<S>(
    forwarders: Arc<DashMap<SubscriptionId, JoinHandle<()>>>,
    id: SubscriptionId,
    table: Table,
    mut payloads: S,
    tx: mpsc::UnboundedSender<ChangeEvent>,
) where
    S: Stream<Item = Bytes> + Unpin + Send + 'static,
{
    let registry = forwarders.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                payload = payloads.next() => {
                    let Some(payload) = payload else { break };
                    let event = ChangeEvent {
                        table,
                        kind: ChangeKind::from_payload(&payload),
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                // Receiver dropped without an unsubscribe
                _ = tx.closed() => break,
            }
        }
        registry.remove(&id);
        debug!(%table, %id, "Change subscription closed");
    });

    forwarders.insert(id, handle);
    // The task may have finished before it was registered
    let finished = forwarders.get(&id).is_some_and(|handle| handle.is_finished());
    if finished {
        forwarders.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    // Delivery needs a running NATS server; see the listener integration
    // tests for the same flow over the in-memory feed.
    use super::*;

    async fn wait_until_empty(forwarders: &DashMap<SubscriptionId, JoinHandle<()>>) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !forwarders.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_forwarder_delivers_and_deregisters_when_stream_ends() {
        let forwarders = Arc::new(DashMap::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let payloads = futures_util::stream::iter(vec![
            Bytes::from_static(b"insert"),
            Bytes::from_static(b"garbage"),
        ]);

        spawn_forwarder(forwarders.clone(), SubscriptionId::new(), Table::Tags, payloads, tx);

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Insert);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.table, Table::Tags);
        assert_eq!(second.kind, ChangeKind::Unknown);
        assert!(rx.recv().await.is_none());
        wait_until_empty(&forwarders).await;
    }

    #[tokio::test]
    async fn test_forwarder_exits_when_receiver_dropped() {
        let forwarders = Arc::new(DashMap::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        // A quiet subject: no message would ever wake the forwarder
        spawn_forwarder(forwarders.clone(), id, Table::Offers, futures_util::stream::pending(), tx);
        assert!(forwarders.contains_key(&id));

        drop(rx);
        wait_until_empty(&forwarders).await;
    }

    #[test]
    fn test_default_prefix_subjects() {
        assert_eq!(
            format!("{}.{}", DEFAULT_SUBJECT_PREFIX, Table::DishTags),
            "catalog.changes.dish_tags"
        );
    }
}
