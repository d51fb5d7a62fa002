use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::EnvFilter;

mod balance;
mod config;
mod details;
mod error;
mod exchange;
mod money;
mod qr;
mod routes;
mod schemas;
mod share;
mod storage;
mod store;

use crate::config::Config;
use crate::routes::AppState;
use crate::storage::{BillStorage, JsonFileStorage, MemoryStorage};
use crate::store::BillStore;

fn open_storage(config: &Config) -> Arc<dyn BillStorage> {
    match &config.storage_path {
        Some(path) => Arc::new(JsonFileStorage::new(path)),
        None => Arc::new(MemoryStorage::default()),
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config =
        Config::from_env().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let storage = open_storage(&config);
    let snapshot = storage.load().map_err(io::Error::other)?.unwrap_or_default();
    tracing::info!(
        storage = ?config.storage_path,
        saved_bills = snapshot.bills.len(),
        "store loaded"
    );

    let state = web::Data::new(AppState::new(
        BillStore::from_snapshot(snapshot),
        storage,
        config.clone(),
    ));
    let allowed_origin = config.allowed_origin.clone();

    tracing::info!(host = %config.host, port = config.port, "listening");
    HttpServer::new(move || {
        let cors = match &allowed_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header(),
            None => Cors::permissive(),
        };
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
