//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dhaba_catalog::catalog::CatalogSnapshot;
use dhaba_catalog::store::InMemoryStore;
use serde_json::Value as JsonValue;
use tokio::sync::watch;

/// The sample menu shipped with the repository
pub fn seed() -> JsonValue {
    serde_json::from_str(include_str!("../../seed/menu.json")).unwrap()
}

pub fn seeded_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::from_seed(&seed()).unwrap())
}

/// Wait (bounded) until the snapshot satisfies `predicate`
pub async fn wait_for_snapshot(
    updates: &mut watch::Receiver<CatalogSnapshot>,
    predicate: impl FnMut(&CatalogSnapshot) -> bool,
) -> CatalogSnapshot {
    tokio::time::timeout(Duration::from_secs(2), updates.wait_for(predicate))
        .await
        .expect("snapshot condition not reached in time")
        .expect("catalog dropped")
        .clone()
}

/// Wait (bounded) until `condition` holds, polling
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
