//! Runtime configuration from environment variables.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL; the in-memory backend is used when unset.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    /// Root directory for per-session cart files.
    pub cart_dir: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            nats_url: None,
            cart_dir: PathBuf::from("data/carts"),
            port: 8083,
        }
    }
}

impl Config {
    /// - `DATABASE_URL`: optional Postgres URL
    /// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `NATS_URL`: optional event bus
    /// - `CART_STORAGE_DIR`: cart files root (default: `data/carts`)
    /// - `PORT`: listen port (default: 8083)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            max_connections: parse(&non_empty, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            nats_url: non_empty("NATS_URL"),
            cart_dir: non_empty("CART_STORAGE_DIR").map(PathBuf::from).unwrap_or(defaults.cart_dir),
            port: parse(&non_empty, "PORT")?.unwrap_or(defaults.port),
        })
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError> {
    lookup(name).map(|value| value.trim().parse().map_err(|_| ConfigError::Invalid { name, value })).transpose()
}
