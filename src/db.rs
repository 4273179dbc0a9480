use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Postgres, Transaction,
};

use crate::config::{AppConfig, PoolConfig};
use crate::error::{AppError, AppResult};

pub type PgTx = Transaction<'static, Postgres>;

/// Something that can open, commit and roll back transactions.
///
/// The service only talks to the store through this trait, so tests can swap
/// the Postgres pool for an in-memory store.
#[async_trait]
pub trait Database: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> AppResult<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> AppResult<()>;
    async fn rollback(&self, tx: Self::Tx) -> AppResult<()>;
}

#[async_trait]
impl Database for PgPool {
    type Tx = PgTx;

    async fn begin(&self) -> AppResult<PgTx> {
        sqlx::Pool::begin(self)
            .await
            .map_err(AppError::transaction("begin"))
    }

    async fn commit(&self, tx: PgTx) -> AppResult<()> {
        tx.commit().await.map_err(AppError::transaction("commit"))
    }

    async fn rollback(&self, tx: PgTx) -> AppResult<()> {
        tx.rollback().await.map_err(AppError::transaction("rollback"))
    }
}

/// Have the server cancel any statement running longer than `timeout`.
///
/// Dropping a query future on the client does not stop it on the server, so
/// the use-case deadline has to be enforced here as well.
pub fn with_statement_timeout(options: PgConnectOptions, timeout: Duration) -> PgConnectOptions {
    options.options([("statement_timeout", timeout.as_millis().to_string())])
}

pub fn pool_options(pool: &PoolConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(pool.max_connections)
        .min_connections(pool.min_connections)
        .idle_timeout(pool.idle_timeout)
        .max_lifetime(pool.max_lifetime)
        .acquire_timeout(pool.acquire_timeout)
}

pub async fn connect(config: &AppConfig) -> AppResult<PgPool> {
    let pool = &config.pool;
    tracing::info!(
        max_connections = pool.max_connections,
        min_connections = pool.min_connections,
        statement_timeout_ms = config.query_timeout.as_millis() as u64,
        "connecting to database"
    );
    pool_options(pool)
        .connect_with(with_statement_timeout(
            config.database.clone(),
            config.query_timeout,
        ))
        .await
        .map_err(AppError::Connection)
}

pub async fn ping(db: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(db)
        .await
        .map_err(AppError::query("ping database"))?;
    Ok(())
}
