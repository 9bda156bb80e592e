use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Sqlite;

pub type DbPool = sqlx::SqlitePool;

/// A connection checked out for a single operation. Dropping it hands it back.
pub type DbConnection = PoolConnection<Sqlite>;

/// Supplies a live connection per call. Callers own the connection for the
/// duration of one statement and release it by dropping it.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self) -> Result<DbConnection, sqlx::Error>;
}

#[async_trait]
impl ConnectionProvider for DbPool {
    async fn acquire(&self) -> Result<DbConnection, sqlx::Error> {
        sqlx::Pool::acquire(self).await
    }
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
