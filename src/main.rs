use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info};

use byteopal::api;
use byteopal::blockchain::Ledger;
use byteopal::config::NodeConfig;
use byteopal::service::LedgerService;
use byteopal::storage::{LedgerStore, MemoryStore, SledStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env().map_err(std::io::Error::other)?;

    let store: Arc<dyn LedgerStore> = match &config.data_dir {
        Some(dir) => {
            info!("Opening ledger database at {}", dir.display());
            Arc::new(SledStore::open(dir).map_err(std::io::Error::other)?)
        }
        None => {
            info!("DATA_DIR not set; ledger will live in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let ledger = Ledger::initialize(config.ledger, store).map_err(std::io::Error::other)?;
    let state = web::Data::new(LedgerService::new(
        ledger,
        config.mining_timeout,
        config.mining_max_attempts,
    ));

    println!(
        "⛓️ Starting ledger API at http://{}:{}",
        config.host, config.port
    );

    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    if let Err(e) = state.shutdown() {
        error!("Failed to flush ledger on shutdown: {e}");
    }
    Ok(())
}
