//! Catalog access seam and database/schema enumeration.
//!
//! The engine never talks to a driver directly. It issues the SQL constants
//! defined in this crate through a [`CatalogConnection`], and obtains
//! connections from a [`ConnectionFactory`]. Result values are decoded as
//! text, which is all the catalog queries need.

use std::fmt;

use tracing::debug;

use crate::config::PostgresConfig;
use crate::error::CatalogError;
use crate::identifier::CurrentDatabase;
use crate::pattern::Matcher;
use crate::report::Reporter;

/// Server databases, without templates.
pub const DATABASES_QUERY: &str =
    "SELECT datname::text AS datname FROM pg_database WHERE datname NOT IN ('template0', 'template1') ORDER BY datname";

/// User-visible schemas of the current database.
pub const SCHEMAS_QUERY: &str =
    "SELECT nspname::text AS nspname FROM pg_namespace WHERE nspname NOT LIKE 'pg\\_%' ORDER BY nspname";

/// One row of a catalog result set.
///
/// Cells keep the server's column order and name. A `None` value is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRow {
    cells: Vec<(String, Option<String>)>,
}

impl CatalogRow {
    pub fn new(cells: Vec<(String, Option<String>)>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Value at `index`; `None` when the column is missing or NULL.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|(_, value)| value.as_deref())
    }

    /// Value of the named column; `None` when the column is missing or NULL.
    pub fn get_named(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }
}

/// Rows of a statement, or `None` when the statement produced no result set.
pub type QueryResult = Option<Vec<CatalogRow>>;

/// A live connection to one database's catalog.
pub trait CatalogConnection {
    /// Name of the database this connection is attached to.
    fn current_database(&self) -> Result<String, CatalogError>;

    /// Run `sql` with positional text parameters bound to `$1..$n`.
    fn query(&self, sql: &str, params: &[&str]) -> Result<QueryResult, CatalogError>;
}

/// Which database a new connection should attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// The configured URI or database, falling back to the initial database.
    Configured,
    /// A database discovered by enumeration.
    Named(String),
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured => write!(f, "<configured>"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Opens catalog connections.
pub trait ConnectionFactory {
    type Connection: CatalogConnection;

    fn connect(&self, target: &ConnectTarget) -> Result<Self::Connection, CatalogError>;
}

/// A connection together with the database it resolved to.
///
/// The context owns the connection; dropping it releases the connection.
pub struct DatabaseContext<C> {
    connection: C,
    database: String,
}

impl<C: CatalogConnection> DatabaseContext<C> {
    /// Open a connection and resolve its current database.
    pub fn open<F>(factory: &F, target: &ConnectTarget) -> Result<Self, CatalogError>
    where
        F: ConnectionFactory<Connection = C>,
    {
        let connection = factory.connect(target)?;
        let database = connection.current_database()?;
        debug!(%target, database, "opened catalog connection");
        Ok(Self {
            connection,
            database,
        })
    }

    pub fn new(connection: C, database: impl Into<String>) -> Self {
        Self {
            connection,
            database: database.into(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn query(&self, sql: &str, params: &[&str]) -> Result<QueryResult, CatalogError> {
        self.connection.query(sql, params)
    }
}

impl<C> CurrentDatabase for DatabaseContext<C> {
    fn current_database(&self) -> &str {
        &self.database
    }
}

/// Databases a run should visit.
///
/// A configured database or URI yields exactly one target. Otherwise the
/// bootstrap connection lists the server's databases, minus templates, and
/// each one allowed by the matcher becomes a target.
pub fn target_databases<F>(
    factory: &F,
    config: &PostgresConfig,
    reporter: &mut dyn Reporter,
) -> Result<Vec<ConnectTarget>, CatalogError>
where
    F: ConnectionFactory,
{
    if config.is_single_database() {
        return Ok(vec![ConnectTarget::Configured]);
    }

    let bootstrap = factory.connect(&ConnectTarget::Configured)?;
    let rows = bootstrap.query(DATABASES_QUERY, &[])?.unwrap_or_default();

    let mut targets = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(name) = row.get(0) else {
            continue;
        };
        if !config.database_allowed(name) {
            reporter.report_dropped(name);
            continue;
        }
        targets.push(ConnectTarget::Named(name.to_string()));
    }
    Ok(targets)
}

/// Schemas of the connected database allowed by the matcher.
pub fn target_schemas<C, M>(
    ctx: &DatabaseContext<C>,
    matcher: &M,
    reporter: &mut dyn Reporter,
) -> Result<Vec<String>, CatalogError>
where
    C: CatalogConnection,
    M: Matcher + ?Sized,
{
    let rows = ctx.query(SCHEMAS_QUERY, &[])?.unwrap_or_default();

    let mut schemas = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(schema) = row.get(0) else {
            continue;
        };
        if !matcher.schema_allowed(schema) {
            reporter.report_dropped(&format!("{}.{schema}", ctx.database()));
            continue;
        }
        schemas.push(schema.to_string());
    }
    Ok(schemas)
}
