//! Configuration module for the rental backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Hourly rate charged on return when the rental's station is gone from the catalog.
pub const DEFAULT_FALLBACK_HOURLY_RATE: f64 = 25.0;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the admin routes
    pub api_psk: Option<String>,
    /// Path to the SQLite file backing the key-value store
    pub db_path: PathBuf,
    /// Path to the Tantivy station index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub fallback_hourly_rate: f64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("RENTAL_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("RENTAL_DB_PATH")
            .unwrap_or_else(|_| "./data/rental.sqlite".to_string())
            .into();

        let index_path = env::var("RENTAL_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = env::var("RENTAL_BIND_ADDR")
            .ok()
            .and_then(|addr| match addr.parse() {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    eprintln!("Ignoring invalid RENTAL_BIND_ADDR {:?}: {}", addr, e);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let log_level = env::var("RENTAL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let fallback_hourly_rate = env::var("RENTAL_FALLBACK_HOURLY_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|rate| *rate > 0.0)
            .unwrap_or(DEFAULT_FALLBACK_HOURLY_RATE);

        Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            fallback_hourly_rate,
        }
    }
}
