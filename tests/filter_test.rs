//! Filter View integration tests
//!
//! Exercises menu filtering over the loaded sample menu:
//! - "All" entries in the category and tag option lists
//! - Category, tag and search predicates
//! - Today's special selection

mod common;

use std::sync::Arc;

use dhaba_catalog::catalog::{
    derive_tags, todays_special, CatalogConfig, CatalogSnapshot, CatalogStore, MenuFilter, SENTINEL_ID,
};
use dhaba_catalog::model::Tag;
use dhaba_catalog::store::{DataStore, Filter, InMemoryStore, Table};
use serde_json::json;
use tokio_test::assert_ok;

use common::seeded_store;

async fn loaded(store: &Arc<InMemoryStore>) -> CatalogSnapshot {
    let catalog = CatalogStore::new(store.clone(), CatalogConfig::default());
    assert_ok!(catalog.load_all().await);
    catalog.snapshot()
}

fn ids(dishes: &[&dhaba_catalog::model::Dish]) -> Vec<String> {
    dishes.iter().map(|d| d.id.clone()).collect()
}

// =============================================================================
// "All" entries
// =============================================================================

#[tokio::test]
async fn test_category_options_have_single_all() {
    let snapshot = loaded(&seeded_store()).await;

    let sentinels = snapshot.categories.iter().filter(|c| c.id == SENTINEL_ID).count();
    assert_eq!(sentinels, 1);
    assert_eq!(snapshot.categories[0].name_secondary, "सभी");
}

#[tokio::test]
async fn test_stored_all_category_replaces_sentinel() {
    let mut seed = common::seed();
    seed["categories"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "cat-all", "name_primary": "All", "name_secondary": "सभी" }));
    let store = Arc::new(InMemoryStore::from_seed(&seed).unwrap());
    let snapshot = loaded(&store).await;

    let unfiltered = snapshot
        .categories
        .iter()
        .filter(|c| c.name_primary.to_lowercase() == "all")
        .count();
    assert_eq!(unfiltered, 1);
    assert!(snapshot.categories.iter().all(|c| c.id != SENTINEL_ID));
}

#[tokio::test]
async fn test_tag_sentinel_kept_alongside_stored_all() {
    let store = seeded_store();
    store
        .insert(Table::Tags, vec![json!({ "name": "All", "color": "#111111" })])
        .await
        .unwrap();
    let snapshot = loaded(&store).await;

    assert_eq!(snapshot.tags[0].id, SENTINEL_ID);
    assert_eq!(snapshot.tags[0].color, "#10b981");
    let sentinels = snapshot.tags.iter().filter(|t| t.id == SENTINEL_ID).count();
    assert_eq!(sentinels, 1);
    let named_all = snapshot.tags.iter().filter(|t| t.name == "All").count();
    assert_eq!(named_all, 2);
}

#[test]
fn test_configured_tag_color() {
    let tags = derive_tags(Vec::<Tag>::new(), "#123456");
    assert_eq!(tags[0].color, "#123456");
}

// =============================================================================
// Predicates
// =============================================================================

#[tokio::test]
async fn test_category_filter_is_exact() {
    let snapshot = loaded(&seeded_store()).await;

    let mains = MenuFilter::new().category("Main Course").apply(&snapshot.dishes);
    assert_eq!(ids(&mains), vec!["dish-dal-makhani", "dish-butter-chicken"]);
    assert!(mains.iter().all(|d| d.category_name() == Some("Main Course")));

    assert!(MenuFilter::new().category("main course").apply(&snapshot.dishes).is_empty());
    assert!(MenuFilter::new().category("Main").apply(&snapshot.dishes).is_empty());
}

#[tokio::test]
async fn test_tag_filter_ignores_case() {
    let snapshot = loaded(&seeded_store()).await;

    let lower = ids(&MenuFilter::new().tag("veg").apply(&snapshot.dishes));
    let upper = ids(&MenuFilter::new().tag("VEG").apply(&snapshot.dishes));
    let stored = ids(&MenuFilter::new().tag("Veg").apply(&snapshot.dishes));

    assert_eq!(lower, upper);
    assert_eq!(lower, stored);
    // "Non-Veg" is a different tag, not a substring match
    assert_eq!(
        lower,
        vec!["dish-masala-chai", "dish-butter-naan", "dish-dal-makhani", "dish-paneer-tikka"]
    );
}

#[tokio::test]
async fn test_predicates_combine() {
    let snapshot = loaded(&seeded_store()).await;

    let filter = MenuFilter::new().category("Starters").tag("spicy").search("tandoor");
    assert_eq!(ids(&filter.apply(&snapshot.dishes)), vec!["dish-paneer-tikka"]);

    let filter = MenuFilter::new().category("Breads").tag("spicy");
    assert!(filter.apply(&snapshot.dishes).is_empty());
}

#[tokio::test]
async fn test_search_never_grows_results() {
    let snapshot = loaded(&seeded_store()).await;
    let bases = [
        MenuFilter::new(),
        MenuFilter::new().tag("Veg"),
        MenuFilter::new().category("Main Course"),
    ];

    for base in bases {
        let unsearched = ids(&base.apply(&snapshot.dishes));
        for term in ["butter", "BUTTER", "दाल", "cream", "zzz", "a"] {
            let searched = ids(&base.clone().search(term).apply(&snapshot.dishes));
            assert!(searched.len() <= unsearched.len(), "search '{}' grew results", term);
            assert!(searched.iter().all(|id| unsearched.contains(id)));
        }
    }
}

#[tokio::test]
async fn test_search_matches_any_name_or_description() {
    let snapshot = loaded(&seeded_store()).await;

    let by_secondary = ids(&MenuFilter::new().search("मखनी").apply(&snapshot.dishes));
    assert_eq!(by_secondary, vec!["dish-dal-makhani"]);

    let by_description = ids(&MenuFilter::new().search("OVERNIGHT").apply(&snapshot.dishes));
    assert_eq!(by_description, vec!["dish-dal-makhani"]);

    let by_primary = ids(&MenuFilter::new().search("butter").apply(&snapshot.dishes));
    assert_eq!(
        by_primary,
        vec!["dish-butter-naan", "dish-dal-makhani", "dish-butter-chicken"]
    );
}

// =============================================================================
// Today's special
// =============================================================================

#[tokio::test]
async fn test_todays_special_is_first_flagged() {
    let store = seeded_store();
    let snapshot = loaded(&store).await;
    assert_eq!(
        todays_special(&snapshot.dishes).map(|d| d.id.as_str()),
        Some("dish-butter-chicken")
    );

    // An older special doesn't displace it; a newer one does
    for id in ["dish-paneer-tikka", "dish-butter-naan"] {
        store
            .update(Table::Dishes, &Filter::id(id), json!({ "is_special": true }))
            .await
            .unwrap();
    }
    let snapshot = loaded(&store).await;
    assert_eq!(
        todays_special(&snapshot.dishes).map(|d| d.id.as_str()),
        Some("dish-butter-naan")
    );
}

#[tokio::test]
async fn test_no_special() {
    let store = seeded_store();
    store
        .update(Table::Dishes, &Filter::new(), json!({ "is_special": false }))
        .await
        .unwrap();
    let snapshot = loaded(&store).await;

    assert!(todays_special(&snapshot.dishes).is_none());
    assert!(snapshot.menu(&MenuFilter::new()).special.is_none());
}
