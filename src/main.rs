//! Dhaba catalog - live menu catalog and admin tool

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dhaba_catalog::{
    admin::{suggest_secondary_name, AdminService, CategoryInput, DishInput, TagInput},
    catalog::{CatalogConfig, CatalogView, MenuFilter, MenuView},
    config::{Args, Backend, Command},
    notice::Notice,
    store::{ChangeFeed, DataStore, InMemoryStore, MongoStore, NatsChangeFeed, Table},
    CatalogError,
};

/// Connected store plus its change feed, when there is one
struct Backends {
    data: Arc<dyn DataStore>,
    feed: Option<Arc<dyn ChangeFeed>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dhaba_catalog={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Dhaba catalog");
    info!("======================================");
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Backend: {:?}", args.backend);
    match args.backend {
        Backend::Memory => info!(
            "Seed: {}",
            args.seed_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(empty)".to_string())
        ),
        Backend::Mongo => {
            info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
            info!("NATS: {} ({}.*)", args.nats.nats_url, args.change_subject_prefix);
        }
    }
    info!("Fetch timeout: {}ms", args.fetch_timeout_ms);
    info!("======================================");

    let backends = connect(&args).await?;
    let config = CatalogConfig::from_args(&args);

    let command = args.command.clone().unwrap_or(Command::Watch {
        filter: Default::default(),
    });

    match command {
        Command::Watch { filter } => watch(backends, config, filter.to_filter()).await,
        Command::Menu { filter } => {
            let view = CatalogView::mount(backends.data, None, config).await;
            let menu = view.menu(&filter.to_filter());
            view.unmount().await;
            println!("{}", serde_json::to_string_pretty(&menu.dishes)?);
            if let Some(message) = menu.empty_message() {
                info!("{}", message);
            }
            Ok(())
        }
        command => run_admin(backends.data, command).await,
    }
}

async fn connect(args: &Args) -> anyhow::Result<Backends> {
    match args.backend {
        Backend::Memory => {
            let store = match args.seed_file {
                Some(ref path) => {
                    let raw = std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
                    let seed: serde_json::Value = serde_json::from_str(&raw)
                        .with_context(|| format!("Seed file {} is not valid JSON", path.display()))?;
                    InMemoryStore::from_seed(&seed)?
                }
                None => {
                    warn!("No SEED_FILE set, starting with an empty in-memory store");
                    InMemoryStore::new()
                }
            };
            let store = Arc::new(store);
            Ok(Backends {
                data: store.clone(),
                feed: Some(store),
            })
        }
        Backend::Mongo => {
            let mongo = match MongoStore::connect(&args.mongodb_uri, &args.mongodb_db).await {
                Ok(store) => store,
                Err(e) => {
                    error!("MongoDB connection failed: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = mongo.apply_indexes().await {
                warn!("Failed to apply MongoDB indexes: {}", e);
            }

            // Live updates need NATS (optional in dev mode)
            let name = format!("dhaba-catalog-{}", uuid::Uuid::new_v4());
            match NatsChangeFeed::connect(&args.nats, &name, &args.change_subject_prefix).await {
                Ok(feed) => {
                    info!("NATS connected successfully");
                    Ok(Backends {
                        data: Arc::new(mongo.with_notifier(feed.clone())),
                        feed: Some(Arc::new(feed)),
                    })
                }
                Err(e) => {
                    if args.dev_mode {
                        warn!("NATS connection failed (dev mode, continuing without live updates): {}", e);
                        Ok(Backends {
                            data: Arc::new(mongo),
                            feed: None,
                        })
                    } else {
                        error!("NATS connection failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        }
    }
}

/// Mount the live view and log the filtered menu on every change
async fn watch(backends: Backends, config: CatalogConfig, filter: MenuFilter) -> anyhow::Result<()> {
    let view = CatalogView::attach(backends.data, backends.feed, config).await;
    let notice_logger = spawn_notice_logger(view.notices());
    let mut updates = view.subscribe();

    // Failures were reported as notices
    let _ = view.store().load_all().await;
    info!("Listening for changes on {:?}", view.listening_to());
    log_menu(&view.menu(&filter));

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let menu = updates.borrow_and_update().menu(&filter);
                log_menu(&menu);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    view.unmount().await;
    notice_logger.abort();
    Ok(())
}

fn log_menu(menu: &MenuView) {
    if let Some(message) = menu.empty_message() {
        info!("{}", message);
        return;
    }
    if menu.loading {
        return;
    }

    info!(shown = menu.dishes.len(), total = menu.total, "Menu");
    if let Some(ref special) = menu.special {
        info!("  Today's special: {} ({}) ₹{}", special.name_primary, special.name_secondary, special.price);
    }
    for dish in &menu.dishes {
        info!(
            "  {} / {} ₹{} [{}]{}",
            dish.name_primary,
            dish.name_secondary,
            dish.price,
            dish.tag_names().join(", "),
            dish.category_name().map(|c| format!(" in {}", c)).unwrap_or_default(),
        );
    }
}

fn spawn_notice_logger(mut notices: broadcast::Receiver<Notice>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) if notice.is_error() => warn!("{}", notice),
                Ok(notice) => info!("{}", notice),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Notice logger fell behind, missed {} notices", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn run_admin(store: Arc<dyn DataStore>, command: Command) -> anyhow::Result<()> {
    let admin = AdminService::new(store);
    let notice_logger = spawn_notice_logger(admin.notices());

    let result = match command {
        Command::Stats => admin.dashboard_stats().await.and_then(|stats| {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }),
        Command::AddCategory { name, secondary } => {
            let input = CategoryInput {
                name_primary: name,
                name_secondary: secondary,
            };
            admin.save_category(None, &input).await.map(|id| println!("{}", id))
        }
        Command::AddTag { name, color } => admin
            .save_tag(None, &TagInput { name, color })
            .await
            .map(|id| println!("{}", id)),
        Command::AddDish {
            name,
            secondary,
            description,
            price,
            category_id,
            rating,
            tags,
            special,
        } => {
            let name_secondary = secondary
                .or_else(|| suggest_secondary_name(&name))
                .unwrap_or_default();
            let input = DishInput {
                name_primary: name,
                name_secondary,
                description,
                price,
                category_id,
                rating,
                is_special: special,
                tag_ids: tags,
                ..DishInput::default()
            };
            admin.save_dish(None, &input).await.map(|id| println!("{}", id))
        }
        Command::ToggleSpecial { id } => match admin.list_dishes().await {
            Ok(dishes) => match dishes.iter().find(|d| d.id == id) {
                Some(dish) => admin.toggle_special(&id, dish.is_special).await.map(|_| ()),
                None => Err(CatalogError::InvalidInput(format!("No dish with id {}", id))),
            },
            Err(e) => Err(e),
        },
        Command::ToggleOffer { id } => match admin.list_offers().await {
            Ok(offers) => match offers.iter().find(|o| o.id == id) {
                Some(offer) => admin.toggle_offer(&id, offer.is_active).await.map(|_| ()),
                None => Err(CatalogError::InvalidInput(format!("No offer with id {}", id))),
            },
            Err(e) => Err(e),
        },
        Command::Delete { table, id } => {
            let table: Table = table.parse().map_err(anyhow::Error::msg)?;
            match table {
                Table::Categories => {
                    let categories = admin.list_categories().await?;
                    let name = categories
                        .iter()
                        .find(|c| c.id == id)
                        .map(|c| c.name_primary.clone())
                        .unwrap_or_default();
                    admin.delete_category(&id, &name).await
                }
                Table::Tags => admin.delete_tag(&id).await,
                Table::Dishes => admin.delete_dish(&id).await,
                Table::Offers => admin.delete_offer(&id).await,
                Table::DishTags => {
                    anyhow::bail!("dish_tags rows are managed through the dish they belong to")
                }
            }
        }
        Command::Watch { .. } | Command::Menu { .. } => Ok(()),
    };

    // Closing the notice channel lets the logger drain and exit
    drop(admin);
    let _ = notice_logger.await;
    result.map_err(Into::into)
}
