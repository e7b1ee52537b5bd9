//! Change Listener
//!
//! Bridges per-table change events into [`CatalogStore::on_change`]. One
//! subscription per table; every event spawns its own refresh so a slow
//! fetch never delays the next notification.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::CatalogStore;
use crate::notice::Notice;
use crate::store::{ChangeFeed, Subscription, SubscriptionId, Table};

pub struct ChangeListener {
    feed: Arc<dyn ChangeFeed>,
    subscriptions: Vec<(SubscriptionId, Table)>,
    pumps: Vec<JoinHandle<()>>,
}

impl ChangeListener {
    /// Subscribe to every table
    ///
    /// A table that cannot be subscribed is logged and reported as a notice;
    /// the others still register.
    pub async fn register(feed: Arc<dyn ChangeFeed>, catalog: Arc<CatalogStore>) -> Self {
        let mut listener = Self {
            feed,
            subscriptions: Vec::with_capacity(Table::ALL.len()),
            pumps: Vec::with_capacity(Table::ALL.len()),
        };

        for table in Table::ALL {
            match listener.feed.subscribe(table).await {
                Ok(subscription) => {
                    listener.subscriptions.push((subscription.id, table));
                    listener.pumps.push(tokio::spawn(pump(subscription, catalog.clone())));
                }
                Err(e) => {
                    warn!(%table, error = %e, "Failed to subscribe to changes");
                    catalog.publish_notice(Notice::error(format!(
                        "Live updates unavailable for {}",
                        table
                    )));
                }
            }
        }

        info!(tables = listener.subscriptions.len(), "Change listener registered");
        listener
    }

    /// Tables with a live subscription
    pub fn tables(&self) -> Vec<Table> {
        self.subscriptions.iter().map(|(_, table)| *table).collect()
    }

    /// Remove every subscription. Call this before dropping the listener;
    /// a plain drop only schedules the removal.
    pub async fn deregister(mut self) {
        for (id, table) in std::mem::take(&mut self.subscriptions) {
            if let Err(e) = self.feed.unsubscribe(id).await {
                warn!(%table, %id, error = %e, "Failed to unsubscribe");
            }
        }
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        debug!("Change listener deregistered");
    }
}

impl Drop for ChangeListener {
    /// Dropping without [`ChangeListener::deregister`] still releases the
    /// feed's subscriptions, from a background task when a runtime is around.
    fn drop(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }

        let subscriptions = std::mem::take(&mut self.subscriptions);
        if subscriptions.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(count = subscriptions.len(), "Change listener dropped outside a runtime");
            return;
        };

        let feed = self.feed.clone();
        runtime.spawn(async move {
            for (id, table) in subscriptions {
                if let Err(e) = feed.unsubscribe(id).await {
                    warn!(%table, %id, error = %e, "Failed to unsubscribe");
                }
            }
        });
    }
}

async fn pump(mut subscription: Subscription, catalog: Arc<CatalogStore>) {
    while let Some(event) = subscription.events.recv().await {
        debug!(table = %event.table, kind = event.kind.as_str(), "Change event");
        let catalog = catalog.clone();
        tokio::spawn(async move {
            // Failures already produced a notice
            let _ = catalog.on_change(event.table).await;
        });
    }
    debug!(table = %subscription.table, "Change subscription ended");
}
