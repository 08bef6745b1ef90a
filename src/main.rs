mod auth;
mod config;
mod db;
mod entities;
mod error;
mod facets;
mod models;
mod routes;
mod store;

use std::sync::Arc;

use crate::{
    auth::{Authenticator, Hs256Authenticator},
    config::Config,
    models::WriteConcern,
    store::{MovieStore, SqliteStore},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MovieStore>,
    pub auth: Arc<dyn Authenticator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,moviebase=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let db = db::connect_and_migrate(&config.database_url, config.database_max_connections).await?;
    let store = SqliteStore::new(
        db,
        config.database_max_connections,
        WriteConcern::new(&config.write_concern_w, config.write_timeout_ms),
    );

    if let Some(seed_file) = &config.seed_file {
        db::seed_from_file(&store, seed_file).await?;
    }

    let state = Arc::new(AppState {
        store: Arc::new(store),
        auth: Arc::new(Hs256Authenticator::new(config.jwt_secret.as_bytes())),
    });

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
