mod api;
mod config;
mod engine;
mod feed;
mod iplist;
mod models;
mod rpc;
mod utils;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::api::routes;
use crate::config::store::ConfigStore;
use crate::engine::reconciler::Reconciler;
use crate::feed::manager::FeedManager;
use crate::feed::poller;
use crate::models::config::AppConfig;
use crate::rpc::client::BackendClient;
use crate::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Geo-filter reconciliation panel backend")]
struct Args {
    /// Path of the configuration store file
    #[clap(short, long, default_value = "/etc/geomate/geomate.json")]
    config: PathBuf,

    /// Directory holding per-filter IP list files
    #[clap(short, long, default_value = "/etc/geomate.d")]
    data_dir: PathBuf,

    /// Base URL of the enforcement backend RPC
    #[clap(short, long, default_value = "http://127.0.0.1:8090")]
    backend_url: String,

    /// Port for the REST API server
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Seconds between connection/allowed-IP polls
    #[clap(long, default_value = "2")]
    feed_interval: u64,

    /// Seconds between service status polls
    #[clap(long, default_value = "5")]
    status_interval: u64,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger with specified level
    logging::init_logger(logging::get_log_level(&args.log_level));

    info!("Starting geomate-panel v{}", env!("CARGO_PKG_VERSION"));

    // Create application config
    let config = AppConfig {
        store_path: args.config,
        data_dir: args.data_dir,
        backend_url: args.backend_url,
        port: args.port,
        feed_interval_secs: args.feed_interval,
        status_interval_secs: args.status_interval,
    };

    // Initialize the reconciliation engine and the live feed
    let reconciler = Arc::new(Reconciler::new(ConfigStore::new(&config.store_path)));
    let feed = Arc::new(FeedManager::new());
    let client = Arc::new(BackendClient::new(config.backend_url.clone()));

    // Prime the projection so the first request sees current state
    reconciler.load_all().await?;
    info!(
        "Loaded {} geo-filters from {}",
        reconciler.filters().len(),
        config.store_path.display()
    );

    // Start the poll loops against the enforcement backend
    poller::spawn_feed_loop(
        feed.clone(),
        client.clone(),
        Duration::from_secs(config.feed_interval_secs),
    );
    poller::spawn_status_loop(
        feed.clone(),
        client.clone(),
        Duration::from_secs(config.status_interval_secs),
    );

    // Create shared state for our application
    let reconciler_data = web::Data::new(reconciler);
    let feed_data = web::Data::new(feed);
    let config_data = web::Data::new(config.clone());

    info!("Starting geomate-panel API server on port {}", config.port);

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(reconciler_data.clone())
            .app_data(feed_data.clone())
            .app_data(config_data.clone())
            .configure(routes::configure)
    })
    .bind(format!("127.0.0.1:{}", config.port))?
    .run()
    .await?;

    Ok(())
}
