use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub write_concern_w: String,
    pub write_timeout_ms: Option<u64>,
    pub jwt_secret: String,
    pub seed_file: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://moviebase.db?mode=rwc".to_string());

        let database_max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let write_concern_w =
            std::env::var("WRITE_CONCERN_W").unwrap_or_else(|_| "1".to_string());

        let write_timeout_ms = match std::env::var("WRITE_TIMEOUT_MS") {
            Ok(raw) => Some(raw.parse().context("WRITE_TIMEOUT_MS")?),
            Err(_) => None,
        };

        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let seed_file = std::env::var("SEED_FILE").ok().filter(|s| !s.trim().is_empty());

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            database_max_connections,
            write_concern_w,
            write_timeout_ms,
            jwt_secret,
            seed_file,
        })
    }
}
