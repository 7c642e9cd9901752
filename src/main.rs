use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info};

use powledger::api::{self, AppState};
use powledger::blockchain::Blockchain;
use powledger::config::{Config, StoreKind};
use powledger::store::{MemoryStore, RocksStore, Store};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env().map_err(|e| {
        error!("configuration: {e}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let store: Arc<dyn Store> = match config.store {
        StoreKind::RocksDb => Arc::new(RocksStore::open(&config.data_dir).map_err(io_error)?),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };

    let blockchain = Arc::new(Blockchain::new(store, config.chain.clone()));
    blockchain.load().map_err(io_error)?;
    if blockchain.is_empty() {
        blockchain.generate_genesis().map_err(io_error)?;
    }
    info!(
        "ledger ready: {} blocks, difficulty {}",
        blockchain.len(),
        blockchain.difficulty()
    );

    let (host, port) = (config.host.clone(), config.port);
    println!("⛓️ Starting ledger API at http://{host}:{port}");

    let state = web::Data::new(AppState::new(blockchain.clone()));

    let served = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(16 * 1024 * 1024))
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await;

    blockchain.close().map_err(io_error)?;
    info!("exited normally");
    served
}

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    error!("{e}");
    std::io::Error::other(e.to_string())
}
