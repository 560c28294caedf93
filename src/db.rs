use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteAutoVacuum, SqliteConnectOptions, SqliteConnection, SqliteJournalMode,
    SqliteSynchronous,
};
use sqlx::{ConnectOptions, Connection};
use std::{str::FromStr, time::Duration};
use tracing::{Instrument, Span};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Hands out a database connection for one ingest run. The connection is
/// closed by the caller when the run ends.
#[async_trait::async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self, span: &Span) -> Result<SqliteConnection>;
}

pub struct SqliteConnector {
    options: SqliteConnectOptions,
}

impl SqliteConnector {
    pub fn new(options: SqliteConnectOptions) -> Self {
        SqliteConnector { options }
    }

    pub fn from_url(database_url: &str) -> Result<Self> {
        Ok(SqliteConnector::new(connect_options(database_url)?))
    }

    pub async fn migrate(&self) -> Result<()> {
        let mut conn = self.options.connect().await?;
        MIGRATOR
            .run(&mut conn)
            .await
            .context("Failed to run migrations")?;
        conn.close().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for SqliteConnector {
    async fn connect(&self, span: &Span) -> Result<SqliteConnection> {
        let conn = self
            .options
            .connect()
            .instrument(span.clone())
            .await
            .context("Could not open database connection")?;
        span.in_scope(|| tracing::debug!("database connection opened"));
        Ok(conn)
    }
}

pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions> {
    // https://briandouglas.ie/sqlite-defaults/
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Failed to parse SQLite path {}", database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true)
        .auto_vacuum(SqliteAutoVacuum::Incremental)
        .pragma("cache_size", "-20000")
        .pragma("temp_store", "MEMORY")
        .page_size(8192);
    Ok(options)
}
