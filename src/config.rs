use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 25,
            min_connections: 0,
            idle_timeout: Duration::from_secs(60 * 60),
            max_lifetime: Duration::from_secs(5 * 60),
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PgConnectOptions,
    pub host: String,
    pub port: u16,
    pub pool: PoolConfig,
    pub query_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = match get("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(&url).context("invalid DATABASE_URL")?,
            None => {
                let user = get("DB_USER").context("DATABASE_URL or DB_USER must be set")?;
                let name = get("DB_NAME").context("DATABASE_URL or DB_NAME must be set")?;
                let host = get("DB_HOST").unwrap_or_else(|| "localhost".into());
                let port: u16 = parse_or(&get, "DB_PORT", 5432)?;
                let options = PgConnectOptions::new()
                    .host(&host)
                    .port(port)
                    .username(&user)
                    .database(&name);
                match get("DB_PASS") {
                    Some(pass) => options.password(&pass),
                    None => options,
                }
            }
        };

        let defaults = PoolConfig::default();
        let pool = PoolConfig {
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&get, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            idle_timeout: secs_or(&get, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            max_lifetime: secs_or(&get, "DB_MAX_LIFETIME_SECS", defaults.max_lifetime)?,
            acquire_timeout: secs_or(&get, "DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout)?,
        };
        if pool.min_connections > pool.max_connections {
            return Err(anyhow!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                pool.min_connections,
                pool.max_connections
            ));
        }

        let query_timeout = secs_or(&get, "QUERY_TIMEOUT_SECS", Duration::from_secs(30))?;
        if query_timeout.is_zero() {
            bail!("QUERY_TIMEOUT_SECS must be greater than 0");
        }

        Ok(Self {
            database,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080)?,
            pool,
            query_timeout,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn secs_or<F>(get: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default.as_secs()).map(Duration::from_secs)
}
