//! SQLx-based catalog connections.
//!
//! The engine is synchronous, so each connection drives its I/O through a
//! shared current-thread runtime with `block_on`.

use std::str::FromStr;
use std::sync::Arc;

use pgscope_core::{
    CatalogConnection, CatalogError, CatalogRow, ConnectTarget, ConnectionFactory, PostgresConfig,
    QueryResult,
};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection, Row};
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;
use tracing::debug;

const CURRENT_DATABASE_QUERY: &str = "SELECT current_database()::text";

/// Problems building a factory from configuration.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid connection URI: {0}")]
    InvalidUri(#[source] sqlx::Error),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Opens one [`PgConnection`] per requested database.
pub struct SqlxConnectionFactory {
    runtime: Arc<Runtime>,
    options: PgConnectOptions,
    uses_uri: bool,
    bootstrap: Option<String>,
}

impl SqlxConnectionFactory {
    pub fn new(config: &PostgresConfig) -> Result<Self, ProviderError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ProviderError::Runtime)?;
        Ok(Self {
            runtime: Arc::new(runtime),
            options: connect_options(config)?,
            uses_uri: config.connection_uri.is_some(),
            bootstrap: config.bootstrap_database().map(str::to_string),
        })
    }

    /// Options for a target. Nothing is dialed here.
    pub fn options_for(&self, target: &ConnectTarget) -> PgConnectOptions {
        match target {
            // A URI already names its database.
            ConnectTarget::Configured if self.uses_uri => self.options.clone(),
            ConnectTarget::Configured => match &self.bootstrap {
                Some(database) => self.options.clone().database(database),
                None => self.options.clone(),
            },
            ConnectTarget::Named(name) => self.options.clone().database(name),
        }
    }
}

impl ConnectionFactory for SqlxConnectionFactory {
    type Connection = SqlxCatalogConnection;

    fn connect(&self, target: &ConnectTarget) -> Result<Self::Connection, CatalogError> {
        let options = self.options_for(target);
        let connection = self
            .runtime
            .block_on(options.connect())
            .map_err(|e| CatalogError::Connection(e.to_string()))?;
        debug!(%target, "connected");
        Ok(SqlxCatalogConnection {
            runtime: Arc::clone(&self.runtime),
            connection: Mutex::new(connection),
        })
    }
}

/// A single server connection. Dropping it closes the socket.
pub struct SqlxCatalogConnection {
    runtime: Arc<Runtime>,
    connection: Mutex<PgConnection>,
}

impl SqlxCatalogConnection {
    async fn fetch(&self, sql: &str, params: &[&str]) -> Result<Vec<PgRow>, sqlx::Error> {
        let mut connection = self.connection.lock().await;
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        query.fetch_all(&mut *connection).await
    }

    /// Close the connection gracefully.
    pub fn close(self) -> Result<(), CatalogError> {
        let connection = self.connection.into_inner();
        self.runtime
            .block_on(connection.close())
            .map_err(|e| CatalogError::Connection(e.to_string()))
    }
}

impl CatalogConnection for SqlxCatalogConnection {
    fn current_database(&self) -> Result<String, CatalogError> {
        let rows = self
            .runtime
            .block_on(self.fetch(CURRENT_DATABASE_QUERY, &[]))
            .map_err(|e| CatalogError::Query(e.to_string()))?;
        rows.first()
            .map(|row| row.try_get::<String, _>(0))
            .transpose()
            .map_err(|e| CatalogError::Decode(e.to_string()))?
            .ok_or_else(|| CatalogError::Query("current_database() returned no rows".to_string()))
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<QueryResult, CatalogError> {
        let rows = self
            .runtime
            .block_on(self.fetch(sql, params))
            .map_err(|e| CatalogError::Query(e.to_string()))?;
        let rows = rows.iter().map(to_catalog_row).collect::<Result<_, _>>()?;
        Ok(Some(rows))
    }
}

fn to_catalog_row(row: &PgRow) -> Result<CatalogRow, CatalogError> {
    let cells = row
        .columns()
        .iter()
        .map(|column| {
            let value = row
                .try_get::<Option<String>, _>(column.ordinal())
                .map_err(|e| CatalogError::Decode(format!("column '{}': {e}", column.name())))?;
            Ok((column.name().to_string(), value))
        })
        .collect::<Result<_, CatalogError>>()?;
    Ok(CatalogRow::new(cells))
}

/// Base options: the URI when given, otherwise host, port and credentials.
fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, ProviderError> {
    if let Some(uri) = &config.connection_uri {
        return PgConnectOptions::from_str(uri).map_err(ProviderError::InvalidUri);
    }

    let (host, port) = config.host_and_port();
    let mut options = PgConnectOptions::new().host(host);
    if let Some(port) = port {
        options = options.port(port);
    }
    if let Some(username) = &config.username {
        options = options.username(username);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    Ok(options)
}
