mod analyze;
mod config;
mod error;
mod ingest;
mod parse;
mod render;
mod server;
mod state;
mod store;
mod types;

use analyze::HttpAnalyzer;
use config::Config;
use env_logger::Env;
use ingest::Ingestor;
use log::{error, info};
use store::Store;
use tokio::sync::mpsc::channel;

#[macro_use]
extern crate failure;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting violation-board");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let analyzer = match HttpAnalyzer::new(&config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            error!("Unable to build analysis client: {}", e);
            std::process::exit(1);
        }
    };
    info!("Analysis endpoint: {}", config.analyze_url);

    let store = Store::new();
    let (tx, rx) = channel(config.queue_depth);
    let ingestor = Ingestor::new(store.clone(), analyzer, config.default_feed.clone());
    let ingest_task = tokio::spawn(ingest::run(ingestor, rx));
    let server_task = tokio::spawn(server::run(store, tx, config));
    tokio::select! {
        result = ingest_task => {
            if let Err(e) = result {
                error!("Ingest task failed: {}", e);
            }
        }
        result = server_task => {
            if let Err(e) = result {
                error!("Server task failed: {}", e);
            }
        }
    }
    info!("Exiting main");
}
