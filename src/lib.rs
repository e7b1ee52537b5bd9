//! Dhaba catalog - data side of the restaurant site
//!
//! Keeps a live, filterable mirror of the menu and offers the content
//! management operations behind the admin panel.
//!
//! ## Components
//!
//! - **Catalog**: store mirror, filter view, change listener and view owner
//! - **Admin**: category/tag/dish/offer management and dashboard counts
//! - **Store**: the `DataStore`/`ChangeFeed` contract with in-memory,
//!   MongoDB and NATS implementations
//! - **Model**: typed records parsed and validated from store rows

pub mod admin;
pub mod catalog;
pub mod config;
pub mod model;
pub mod notice;
pub mod store;
pub mod types;

pub use admin::AdminService;
pub use catalog::{CatalogConfig, CatalogSnapshot, CatalogStore, CatalogView, MenuFilter};
pub use config::Args;
pub use notice::Notice;
pub use types::{CatalogError, Result};
