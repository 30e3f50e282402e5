use anyhow::{bail, Result};
use sqlx::{any::AnyPoolOptions, AnyPool};

/// Database flavours the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    Sqlite,
}

impl Backend {
    pub fn from_url(database_url: &str) -> Result<Self> {
        if database_url.starts_with("mysql:") {
            Ok(Backend::MySql)
        } else if database_url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            bail!("Unsupported DATABASE_URL scheme: {}", database_url)
        }
    }
}

pub async fn create_pool(database_url: &str) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let backend = Backend::from_url(database_url)?;
    let options = if backend == Backend::Sqlite && database_url.contains(":memory:") {
        // An in-memory SQLite database lives as long as its one connection.
        AnyPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        AnyPoolOptions::new().max_connections(10)
    };

    let pool = options.connect(database_url).await?;
    Ok(pool)
}
