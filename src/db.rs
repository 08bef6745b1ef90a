use std::path::Path;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use tracing::{info, warn};

use crate::{error::AppResult, models::Movie, store::SqliteStore};

pub async fn connect_and_migrate(
    database_url: &str,
    max_connections: u32,
) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url);
    options.max_connections(max_connections.max(1)).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA journal_mode=WAL".to_string(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA synchronous=NORMAL".to_string(),
    ))
    .await?;

    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Loads a JSON array of movies into an empty catalog. A catalog that already
/// has movies is left alone.
pub async fn seed_from_file(store: &SqliteStore, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();

    let existing = store.count_movies().await?;
    if existing > 0 {
        info!(existing, "catalog already populated, skipping seed");
        return Ok(());
    }

    let raw = tokio::fs::read_to_string(path).await?;
    let movies: Vec<Movie> = serde_json::from_str(&raw)?;
    if movies.is_empty() {
        warn!(path = %path.display(), "seed file has no movies");
        return Ok(());
    }

    let inserted = store.insert_movies(&movies).await?;
    info!(inserted, path = %path.display(), "seeded movie catalog");
    Ok(())
}
