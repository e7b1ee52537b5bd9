//! Catalog View: owns one store and one listener from mount to unmount

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use super::filter::{MenuFilter, MenuView};
use super::listener::ChangeListener;
use super::store::{CatalogConfig, CatalogSnapshot, CatalogStore};
use crate::notice::Notice;
use crate::store::{ChangeFeed, DataStore, Table};

pub struct CatalogView {
    store: Arc<CatalogStore>,
    listener: Option<ChangeListener>,
}

impl CatalogView {
    /// Create a fresh store and attach the listener without fetching yet
    ///
    /// Lets callers subscribe to notices before the first load.
    pub async fn attach(
        source: Arc<dyn DataStore>,
        feed: Option<Arc<dyn ChangeFeed>>,
        config: CatalogConfig,
    ) -> Self {
        let store = Arc::new(CatalogStore::new(source, config));
        // Listen first so a change landing during the initial load still
        // triggers a refresh
        let listener = match feed {
            Some(feed) => Some(ChangeListener::register(feed, store.clone()).await),
            None => None,
        };
        Self { store, listener }
    }

    /// Attach and perform the initial load
    ///
    /// A failed initial load still returns a mounted view; the failure has
    /// been reported as a notice and the affected collections stay empty.
    pub async fn mount(
        source: Arc<dyn DataStore>,
        feed: Option<Arc<dyn ChangeFeed>>,
        config: CatalogConfig,
    ) -> Self {
        let view = Self::attach(source, feed, config).await;
        // Failures are already logged and published
        let _ = view.store.load_all().await;
        info!("Catalog view mounted");
        view
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.store.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.store.notices()
    }

    /// Tables with a live change subscription
    pub fn listening_to(&self) -> Vec<Table> {
        self.listener
            .as_ref()
            .map(ChangeListener::tables)
            .unwrap_or_default()
    }

    pub fn menu(&self, filter: &MenuFilter) -> MenuView {
        self.store.snapshot().menu(filter)
    }

    /// Close the store and drop every subscription
    ///
    /// Must be called when the view goes away. Dropping a mounted view only
    /// closes the store and schedules the unsubscribes in the background.
    pub async fn unmount(mut self) {
        self.store.close();
        if let Some(listener) = self.listener.take() {
            listener.deregister().await;
        }
        info!("Catalog view unmounted");
    }
}

impl Drop for CatalogView {
    fn drop(&mut self) {
        self.store.close();
    }
}
