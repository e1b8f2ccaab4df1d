//! Scripted catalog connections for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::{CatalogConnection, CatalogRow, ConnectTarget, ConnectionFactory, QueryResult};
use crate::error::CatalogError;

/// Build a row from `(column, value)` pairs.
pub fn row(cells: &[(&str, Option<&str>)]) -> CatalogRow {
    CatalogRow::new(
        cells
            .iter()
            .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
            .collect(),
    )
}

/// Build a four-column view dependency row.
pub fn edge_row(source_table: &str, source_schema: &str, view: &str, view_schema: &str) -> CatalogRow {
    row(&[
        ("source_table", Some(source_table)),
        ("source_schema", Some(source_schema)),
        ("dependent_view", Some(view)),
        ("dependent_schema", Some(view_schema)),
    ])
}

type Key = (String, Vec<String>);

/// Connection answering queries from a script keyed by SQL text and parameters.
///
/// A script registered without parameters answers any parameters. Unscripted
/// statements return an empty result set.
#[derive(Clone, Default)]
pub struct ScriptedConnection {
    database: String,
    responses: HashMap<Key, Result<QueryResult, CatalogError>>,
    executed: Rc<RefCell<Vec<Key>>>,
}

impl ScriptedConnection {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..Default::default()
        }
    }

    pub fn with_rows(self, sql: &str, rows: Vec<CatalogRow>) -> Self {
        self.respond(sql, &[], Ok(Some(rows)))
    }

    pub fn with_rows_for(self, sql: &str, params: &[&str], rows: Vec<CatalogRow>) -> Self {
        self.respond(sql, params, Ok(Some(rows)))
    }

    pub fn with_no_result_set(self, sql: &str) -> Self {
        self.respond(sql, &[], Ok(None))
    }

    pub fn with_error_for(self, sql: &str, params: &[&str], err: CatalogError) -> Self {
        self.respond(sql, params, Err(err))
    }

    fn respond(
        mut self,
        sql: &str,
        params: &[&str],
        response: Result<QueryResult, CatalogError>,
    ) -> Self {
        self.responses.insert(key(sql, params), response);
        self
    }

    /// Statements executed so far, with their parameters.
    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        self.executed.borrow().clone()
    }
}

fn key(sql: &str, params: &[&str]) -> Key {
    (sql.to_string(), params.iter().map(|p| p.to_string()).collect())
}

impl CatalogConnection for ScriptedConnection {
    fn current_database(&self) -> Result<String, CatalogError> {
        Ok(self.database.clone())
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<QueryResult, CatalogError> {
        let exact = key(sql, params);
        self.executed.borrow_mut().push(exact.clone());
        self.responses
            .get(&exact)
            .or_else(|| self.responses.get(&key(sql, &[])))
            .cloned()
            .unwrap_or(Ok(Some(Vec::new())))
    }
}

/// Factory handing out clones of registered connections by target.
#[derive(Default)]
pub struct ScriptedFactory {
    connections: HashMap<String, ScriptedConnection>,
    connected: RefCell<Vec<String>>,
}

impl ScriptedFactory {
    /// Register a connection for a target; `<configured>` is the configured target.
    pub fn with_connection(mut self, target: &str, connection: ScriptedConnection) -> Self {
        self.connections.insert(target.to_string(), connection);
        self
    }

    pub fn connected(&self) -> Vec<String> {
        self.connected.borrow().clone()
    }
}

impl ConnectionFactory for ScriptedFactory {
    type Connection = ScriptedConnection;

    fn connect(&self, target: &ConnectTarget) -> Result<Self::Connection, CatalogError> {
        let name = target.to_string();
        self.connected.borrow_mut().push(name.clone());
        self.connections
            .get(&name)
            .cloned()
            .ok_or_else(|| CatalogError::Connection(format!("no route to {name}")))
    }
}
