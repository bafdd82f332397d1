use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Reads configuration from the environment (`.env` is loaded earlier by
/// `bootstrap::init_env`). `DATABASE_URL` is required; `PORT` defaults
/// to 3000.
pub fn load() -> Result<Config> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let port = match std::env::var("PORT") {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("PORT must be a valid port number, got {raw:?}"))?,
        Err(_) => 3000,
    };

    Ok(Config {
        database: DatabaseConfig { url },
        server: ServerConfig { port },
    })
}
