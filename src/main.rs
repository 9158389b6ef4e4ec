// src/main.rs
mod api;
mod config;
mod error;
mod models;
mod quote;
mod view;

use crate::config::Config;
use crate::quote::{AlphaVantageClient, QuoteSource};
use env_logger::Builder;
use log::{error, info, LevelFilter};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            return;
        }
    };

    let quotes: Arc<dyn QuoteSource> = match AlphaVantageClient::from_config(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build quote client: {}", e);
            return;
        }
    };

    info!("Starting the paper trading site...");
    info!(
        "Free tier: {} trades, subscription fee ${}, starting balance ${:.2}",
        config.free_limit, config.subscription_fee, config.starting_balance
    );

    let addr = config.bind_addr;
    let app = api::routes(config, quotes);

    info!("Server running on http://{}", addr);
    warp::serve(app).run(addr).await;
}
