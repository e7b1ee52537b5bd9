//! Admin Service integration tests
//!
//! Covers content management against the seeded in-memory backend:
//! - Dish saves and tag association replacement
//! - Protected "All" category
//! - Input validation before any store call
//! - Specials and offer toggles
//! - Dashboard counts and failure notices

mod common;

use std::sync::Arc;

use dhaba_catalog::admin::{
    AdminService, CategoryInput, DashboardStats, DishInput, OfferInput, TagInput,
};
use dhaba_catalog::notice::{Notice, NoticeLevel};
use dhaba_catalog::store::{DataStore, Filter, InMemoryStore, Table};
use dhaba_catalog::CatalogError;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

use common::seeded_store;

fn admin(store: &Arc<InMemoryStore>) -> (AdminService, broadcast::Receiver<Notice>) {
    let admin = AdminService::new(store.clone());
    let notices = admin.notices();
    (admin, notices)
}

async fn links_for(store: &InMemoryStore, dish_id: &str) -> u64 {
    store
        .count(Table::DishTags, &Filter::new().eq("dish_id", dish_id))
        .await
        .unwrap()
}

fn jeera_rice() -> DishInput {
    DishInput {
        name_primary: "Jeera Rice".into(),
        name_secondary: "जीरा चावल".into(),
        description: "Basmati tempered with cumin".into(),
        price: 140.0,
        category_id: Some("cat-main".into()),
        tag_ids: vec!["tag-veg".into()],
        ..DishInput::default()
    }
}

// =============================================================================
// Dishes
// =============================================================================

#[tokio::test]
async fn test_create_dish_with_tags() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    let id = assert_ok!(admin.save_dish(None, &jeera_rice()).await);
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Dish created successfully"));

    let dishes = assert_ok!(admin.list_dishes().await);
    // Newest first
    assert_eq!(dishes[0].id, id);
    assert_eq!(dishes[0].rating, 4.5);
    assert_eq!(dishes[0].category_name(), Some("Main Course"));
    assert_eq!(dishes[0].tag_names(), vec!["Veg"]);
    assert_eq!(dishes.len(), 7);
}

#[tokio::test]
async fn test_update_dish_replaces_tags() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);
    assert_eq!(links_for(&store, "dish-paneer-tikka").await, 2);

    let input = DishInput {
        name_primary: "Paneer Tikka".into(),
        price: 280.0,
        tag_ids: vec!["tag-chef".into(), "tag-chef".into()],
        ..DishInput::default()
    };
    let id = assert_ok!(admin.save_dish(Some("dish-paneer-tikka"), &input).await);
    assert_eq!(id, "dish-paneer-tikka");
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Dish updated successfully"));

    assert_eq!(links_for(&store, "dish-paneer-tikka").await, 1);
    let dishes = assert_ok!(admin.list_dishes().await);
    let paneer = dishes.iter().find(|d| d.id == "dish-paneer-tikka").unwrap();
    assert_eq!(paneer.price, 280.0);
    assert_eq!(paneer.tag_names(), vec!["Chef's Pick"]);
}

#[tokio::test]
async fn test_clearing_tags() {
    let store = seeded_store();
    let (admin, _notices) = admin(&store);

    let input = DishInput {
        name_primary: "Butter Chicken".into(),
        price: 340.0,
        ..DishInput::default()
    };
    assert_ok!(admin.save_dish(Some("dish-butter-chicken"), &input).await);
    assert_eq!(links_for(&store, "dish-butter-chicken").await, 0);
}

#[tokio::test]
async fn test_updating_missing_dish_fails() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    let err = assert_err!(admin.save_dish(Some("dish-gone"), &jeera_rice()).await);
    assert!(matches!(err, CatalogError::Mutation { table: Table::Dishes, .. }));
    assert_eq!(notices.recv().await.unwrap(), Notice::error("Failed to save dish"));
}

#[tokio::test]
async fn test_delete_dish_removes_links() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    assert_ok!(admin.delete_dish("dish-butter-chicken").await);
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Dish deleted successfully"));
    assert_eq!(links_for(&store, "dish-butter-chicken").await, 0);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_input_never_reaches_store() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);
    let before = store.count(Table::Dishes, &Filter::new()).await.unwrap();

    let input = DishInput {
        price: -10.0,
        ..jeera_rice()
    };
    let err = assert_err!(admin.save_dish(None, &input).await);
    assert!(matches!(err, CatalogError::InvalidInput(_)));

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.description.starts_with("Price must be zero or more"));
    assert_eq!(store.count(Table::Dishes, &Filter::new()).await.unwrap(), before);

    let tag = TagInput {
        name: "Sweet".into(),
        color: "pink".into(),
    };
    assert_err!(admin.save_tag(None, &tag).await);
    assert_eq!(store.count(Table::Tags, &Filter::new()).await.unwrap(), 4);
}

// =============================================================================
// Categories and tags
// =============================================================================

#[tokio::test]
async fn test_all_category_cannot_be_deleted() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);
    let id = assert_ok!(
        admin
            .save_category(
                None,
                &CategoryInput {
                    name_primary: "All".into(),
                    name_secondary: "सभी".into(),
                },
            )
            .await
    );
    let _created = notices.recv().await.unwrap();

    assert_err!(admin.delete_category(&id, "All").await);
    assert_eq!(
        notices.recv().await.unwrap(),
        Notice::error("Cannot delete the 'All' category")
    );
    assert_eq!(store.count(Table::Categories, &Filter::id(id.as_str())).await.unwrap(), 1);
}

#[tokio::test]
async fn test_category_and_tag_round_trip() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    let id = assert_ok!(
        admin
            .save_category(
                None,
                &CategoryInput {
                    name_primary: "Desserts".into(),
                    name_secondary: "मिठाई".into(),
                },
            )
            .await
    );
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Category created successfully"));
    let categories = assert_ok!(admin.list_categories().await);
    assert_eq!(categories.last().map(|c| c.id.as_str()), Some(id.as_str()));

    assert_ok!(admin.delete_category(&id, "Desserts").await);
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Category deleted successfully"));

    let tag_id = assert_ok!(
        admin
            .save_tag(
                None,
                &TagInput {
                    name: "Sweet".into(),
                    color: "#EC4899".into(),
                },
            )
            .await
    );
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Tag created successfully"));
    let tags = assert_ok!(admin.list_tags().await);
    let sweet = tags.iter().find(|t| t.id == tag_id).unwrap();
    assert_eq!(sweet.color, "#ec4899");

    // The admin list is alphabetical
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Chef's Pick", "Non-Veg", "Spicy", "Sweet", "Veg"]);
}

#[tokio::test]
async fn test_delete_tag_detaches_dishes() {
    let store = seeded_store();
    let (admin, _notices) = admin(&store);

    assert_ok!(admin.delete_tag("tag-veg").await);
    assert_eq!(links_for(&store, "dish-dal-makhani").await, 0);
    assert_eq!(links_for(&store, "dish-paneer-tikka").await, 1);
}

// =============================================================================
// Specials and offers
// =============================================================================

#[tokio::test]
async fn test_toggle_special() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    assert!(assert_ok!(admin.toggle_special("dish-dal-makhani", false).await));
    assert_eq!(
        notices.recv().await.unwrap(),
        Notice::success("Dish added to today's specials")
    );
    let specials: Vec<String> = assert_ok!(admin.list_specials().await)
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(specials, vec!["dish-dal-makhani", "dish-butter-chicken"]);

    assert!(!assert_ok!(admin.toggle_special("dish-dal-makhani", true).await));
    assert_eq!(
        notices.recv().await.unwrap(),
        Notice::success("Dish removed from today's specials")
    );
}

#[tokio::test]
async fn test_toggle_offer() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    assert!(assert_ok!(admin.toggle_offer("offer-monsoon", false).await));
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Offer activated successfully"));

    assert!(!assert_ok!(admin.toggle_offer("offer-thali-tuesday", true).await));
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Offer deactivated successfully"));

    let offers = assert_ok!(admin.list_offers().await);
    let active: Vec<&str> = offers.iter().filter(|o| o.is_active).map(|o| o.id.as_str()).collect();
    assert_eq!(active, vec!["offer-monsoon"]);

    assert_err!(admin.toggle_offer("offer-gone", true).await);
    assert_eq!(notices.recv().await.unwrap(), Notice::error("Failed to update offer status"));
}

#[tokio::test]
async fn test_save_offer() {
    let store = seeded_store();
    let (admin, mut notices) = admin(&store);

    let input = OfferInput {
        title: "Family Feast".into(),
        description: Some("  ".into()),
        ..OfferInput::default()
    };
    let id = assert_ok!(admin.save_offer(None, &input).await);
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Offer created successfully"));

    let offers = assert_ok!(admin.list_offers().await);
    let feast = offers.iter().find(|o| o.id == id).unwrap();
    assert!(feast.is_active);
    assert_eq!(feast.description, None);

    assert_ok!(admin.delete_offer(&id).await);
    assert_eq!(notices.recv().await.unwrap(), Notice::success("Offer deleted successfully"));
}

// =============================================================================
// Dashboard and failures
// =============================================================================

#[tokio::test]
async fn test_dashboard_stats() {
    let store = seeded_store();
    let (admin, _notices) = admin(&store);

    let stats = assert_ok!(admin.dashboard_stats().await);
    assert_eq!(
        stats,
        DashboardStats {
            total_dishes: 6,
            total_categories: 4,
            total_tags: 4,
            special_dishes: 1,
        }
    );
}

#[tokio::test]
async fn test_store_failure_becomes_notice() {
    let store = seeded_store();
    store.fail_table(Table::Offers, "connection reset");
    let (admin, mut notices) = admin(&store);

    let input = OfferInput {
        title: "Chai Hour".into(),
        ..OfferInput::default()
    };
    let err = assert_err!(admin.save_offer(None, &input).await);
    assert!(matches!(err, CatalogError::Mutation { table: Table::Offers, .. }));
    assert_eq!(notices.recv().await.unwrap(), Notice::error("Failed to save offer"));

    assert_err!(admin.list_offers().await);
    assert_eq!(notices.recv().await.unwrap(), Notice::error("Failed to load offers"));

    store.fail_table(Table::Tags, "connection reset");
    let err = assert_err!(admin.dashboard_stats().await);
    assert!(matches!(err, CatalogError::Fetch { table: Table::Tags, .. }));
}
