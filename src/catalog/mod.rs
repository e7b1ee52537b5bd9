//! Live menu catalog
//!
//! - [`store`]: mirror of categories, tags, dishes and offers
//! - [`filter`]: category/tag/search selection over the mirrored dishes
//! - [`listener`]: change events to targeted refreshes
//! - [`view`]: lifetime owner tying the three together

pub mod derive;
pub mod filter;
pub mod listener;
pub mod store;
pub mod view;

pub use derive::{derive_categories, derive_tags, SENTINEL_ID};
pub use filter::{todays_special, MenuFilter, MenuView};
pub use listener::ChangeListener;
pub use store::{CatalogConfig, CatalogSnapshot, CatalogStore};
pub use view::CatalogView;
