use std::{env, time::Duration};

use log::*;
use wallet_common::helpers::{parse_boolean_flag, parse_numeric_setting};
use wallet_engine::helpers::RetryPolicy;

const DEFAULT_WALLET_HOST: &str = "127.0.0.1";
const DEFAULT_WALLET_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/wallet.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_CACHE_MAX_ENTRIES: usize = 256;
const DEFAULT_CACHE_JANITOR_PERIOD: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Apply the embedded schema migrations before accepting requests.
    pub run_migrations: bool,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of a cached reconciliation result. Zero disables caching.
    pub ttl: Duration,
    pub max_entries: usize,
    /// How often the janitor sweeps expired entries.
    pub janitor_period: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            janitor_period: DEFAULT_CACHE_JANITOR_PERIOD,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WALLET_HOST.to_string(),
            port: DEFAULT_WALLET_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
            retry: RetryPolicy::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WALLET_HOST").ok().unwrap_or_else(|| DEFAULT_WALLET_HOST.into());
        let port = numeric_env("WALLET_PORT", DEFAULT_WALLET_PORT);
        let database_url = env::var("WALLET_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ WALLET_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = numeric_env("WALLET_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS).max(1);
        let run_migrations = parse_boolean_flag(env::var("WALLET_RUN_MIGRATIONS").ok(), true);
        let retry = RetryPolicy::from_env_or_default();
        let cache = CacheConfig::from_env_or_default();
        Self { host, port, database_url, max_connections, run_migrations, retry, cache }
    }
}

impl CacheConfig {
    pub fn from_env_or_default() -> Self {
        let ttl = numeric_env("WALLET_CACHE_TTL_SECS", DEFAULT_CACHE_TTL.as_secs());
        let max_entries = numeric_env("WALLET_CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES);
        let janitor_period = numeric_env("WALLET_CACHE_JANITOR_SECS", DEFAULT_CACHE_JANITOR_PERIOD.as_secs());
        if ttl == 0 {
            info!("🪛️ WALLET_CACHE_TTL_SECS is 0. Reconciliation results will not be cached.");
        }
        Self {
            ttl: Duration::from_secs(ttl),
            max_entries: max_entries.max(1),
            janitor_period: Duration::from_secs(janitor_period.max(1)),
        }
    }
}

fn numeric_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let (value, err) = parse_numeric_setting(env::var(name).ok(), default);
    if let Some(e) = err {
        error!("🪛️ {name}: {e} Using the default, {default}, instead.");
    }
    value
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::new("0.0.0.0", 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.run_migrations);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        env::set_var("WALLET_TEST_PORT_SETTING", "eighty");
        assert_eq!(numeric_env("WALLET_TEST_PORT_SETTING", 8370u16), 8370);
        env::set_var("WALLET_TEST_PORT_SETTING", " 8080 ");
        assert_eq!(numeric_env("WALLET_TEST_PORT_SETTING", 8370u16), 8080);
        env::remove_var("WALLET_TEST_PORT_SETTING");
    }
}
