use anyhow::{Context, Result};
use std::env;

/// Two weeks.
pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;

const DEV_JWT_SECRET: &str = "campaigns-dev-secret";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub service_name: String,
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub access_ttl_seconds: i64,
    pub pryv_domain: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "campaign-service".to_string()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string()),
            access_ttl_seconds: env::var("ACCESS_TTL_SECONDS")
                .unwrap_or_else(|_| DEFAULT_ACCESS_TTL_SECONDS.to_string())
                .parse()
                .context("ACCESS_TTL_SECONDS must be a number of seconds")?,
            pryv_domain: env::var("PRYV_DOMAIN").unwrap_or_else(|_| "pryv.me".to_string()),
        };

        if config.access_ttl_seconds <= 0 {
            anyhow::bail!("ACCESS_TTL_SECONDS must be positive");
        }

        Ok(config)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
