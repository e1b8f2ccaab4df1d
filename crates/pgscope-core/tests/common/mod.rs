//! In-memory PostgreSQL catalog for driving a whole extraction run.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use pgscope_core::catalog::{DATABASES_QUERY, SCHEMAS_QUERY};
use pgscope_core::lineage::VIEW_LINEAGE_QUERY;
use pgscope_core::procedure::PROCEDURES_QUERY;
use pgscope_core::profile::TABLE_SIZES_QUERY;
use pgscope_core::reflector::{COLUMNS_QUERY, RELATIONS_QUERY};
use pgscope_core::{
    CatalogConnection, CatalogError, CatalogRow, ConnectTarget, ConnectionFactory, MetadataRecord,
    QueryResult, WorkUnit,
};

fn cells(pairs: &[(&str, Option<&str>)]) -> CatalogRow {
    CatalogRow::new(
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
            .collect(),
    )
}

/// Catalog contents of one database.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    schemas: Vec<String>,
    relations: BTreeMap<String, Vec<CatalogRow>>,
    columns: BTreeMap<String, Vec<CatalogRow>>,
    procedures: BTreeMap<String, Result<Vec<CatalogRow>, CatalogError>>,
    edges: Option<Vec<CatalogRow>>,
    sizes: Vec<CatalogRow>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(mut self, name: &str) -> Self {
        self.schemas.push(name.to_string());
        self
    }

    pub fn table(mut self, schema: &str, name: &str, columns: &[(&str, &str)]) -> Self {
        self.relations.entry(schema.to_string()).or_default().push(cells(&[
            ("name", Some(name)),
            ("relkind", Some("r")),
            ("description", None),
            ("view_definition", None),
        ]));
        for &(column, data_type) in columns {
            self.columns.entry(schema.to_string()).or_default().push(cells(&[
                ("table_name", Some(name)),
                ("column_name", Some(column)),
                ("data_type", Some(data_type)),
                ("nullable", Some("true")),
            ]));
        }
        self
    }

    pub fn view(mut self, schema: &str, name: &str, definition: &str) -> Self {
        self.relations.entry(schema.to_string()).or_default().push(cells(&[
            ("name", Some(name)),
            ("relkind", Some("v")),
            ("description", None),
            ("view_definition", Some(definition)),
        ]));
        self
    }

    pub fn procedure(mut self, schema: &str, name: &str) -> Self {
        let row = cells(&[
            ("name", Some(name)),
            ("language", Some("plpgsql")),
            ("arguments", Some("")),
            ("definition", Some("BEGIN NULL; END")),
            ("comment", None),
        ]);
        if let Ok(rows) = self
            .procedures
            .entry(schema.to_string())
            .or_insert_with(|| Ok(Vec::new()))
        {
            rows.push(row);
        }
        self
    }

    pub fn broken_procedures(mut self, schema: &str) -> Self {
        self.procedures.insert(
            schema.to_string(),
            Err(CatalogError::Query(format!(
                "permission denied for schema {schema}"
            ))),
        );
        self
    }

    pub fn edge(mut self, source_table: &str, source_schema: &str, view: &str, view_schema: &str) -> Self {
        self.edges.get_or_insert_with(Vec::new).push(cells(&[
            ("source_table", Some(source_table)),
            ("source_schema", Some(source_schema)),
            ("dependent_view", Some(view)),
            ("dependent_schema", Some(view_schema)),
        ]));
        self
    }

    pub fn size(mut self, schema: &str, table: &str, bytes: i64) -> Self {
        let bytes = bytes.to_string();
        self.sizes.push(cells(&[
            ("schema_name", Some(schema)),
            ("table_name", Some(table)),
            ("size_bytes", Some(bytes.as_str())),
        ]));
        self
    }

    fn answer(&self, sql: &str, params: &[&str]) -> Result<QueryResult, CatalogError> {
        let schema = params.first().copied().unwrap_or_default();
        let by_schema = |map: &BTreeMap<String, Vec<CatalogRow>>| -> Result<QueryResult, CatalogError> {
            Ok(Some(map.get(schema).cloned().unwrap_or_default()))
        };

        if sql == SCHEMAS_QUERY {
            Ok(Some(
                self.schemas
                    .iter()
                    .map(|name| cells(&[("nspname", Some(name.as_str()))]))
                    .collect(),
            ))
        } else if sql == RELATIONS_QUERY {
            by_schema(&self.relations)
        } else if sql == COLUMNS_QUERY {
            by_schema(&self.columns)
        } else if sql == PROCEDURES_QUERY {
            match self.procedures.get(schema) {
                Some(Ok(rows)) => Ok(Some(rows.clone())),
                Some(Err(err)) => Err(err.clone()),
                None => Ok(Some(Vec::new())),
            }
        } else if sql == VIEW_LINEAGE_QUERY {
            Ok(self.edges.clone())
        } else if sql == TABLE_SIZES_QUERY {
            Ok(Some(self.sizes.clone()))
        } else {
            Err(CatalogError::Query(format!("unexpected statement: {sql}")))
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    opened: Cell<usize>,
    live: Cell<usize>,
    max_live: Cell<usize>,
    statements: RefCell<Vec<(String, String)>>,
}

/// A server with several databases, handing out tracked connections.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    bootstrap: String,
    databases: BTreeMap<String, Rc<FakeDatabase>>,
    unreachable: Vec<String>,
    counters: Rc<Counters>,
}

impl FakeServer {
    /// Server whose configured connection lands in `bootstrap`.
    pub fn new(bootstrap: &str) -> Self {
        Self {
            bootstrap: bootstrap.to_string(),
            ..Default::default()
        }
    }

    pub fn database(mut self, name: &str, database: FakeDatabase) -> Self {
        self.databases.insert(name.to_string(), Rc::new(database));
        self
    }

    /// Listed by the server but refusing connections.
    pub fn unreachable(mut self, name: &str) -> Self {
        self.unreachable.push(name.to_string());
        self.databases
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(FakeDatabase::new()));
        self
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.get()
    }

    pub fn max_live(&self) -> usize {
        self.counters.max_live.get()
    }

    pub fn live(&self) -> usize {
        self.counters.live.get()
    }

    /// Statements run against `database`, in order.
    pub fn statements_on(&self, database: &str) -> Vec<String> {
        self.counters
            .statements
            .borrow()
            .iter()
            .filter(|(db, _)| db == database)
            .map(|(_, sql)| sql.clone())
            .collect()
    }
}

impl ConnectionFactory for FakeServer {
    type Connection = FakeConnection;

    fn connect(&self, target: &ConnectTarget) -> Result<Self::Connection, CatalogError> {
        let name = match target {
            ConnectTarget::Configured => self.bootstrap.clone(),
            ConnectTarget::Named(name) => name.clone(),
        };
        if self.unreachable.contains(&name) {
            return Err(CatalogError::Connection(format!(
                "database \"{name}\" is not accepting connections"
            )));
        }
        let database = self
            .databases
            .get(&name)
            .cloned()
            .ok_or_else(|| CatalogError::Connection(format!("database \"{name}\" does not exist")))?;

        let counters = &self.counters;
        counters.opened.set(counters.opened.get() + 1);
        counters.live.set(counters.live.get() + 1);
        counters
            .max_live
            .set(counters.max_live.get().max(counters.live.get()));

        Ok(FakeConnection {
            name,
            database,
            server_databases: self.databases.keys().cloned().collect(),
            counters: Rc::clone(&self.counters),
        })
    }
}

pub struct FakeConnection {
    name: String,
    database: Rc<FakeDatabase>,
    server_databases: Vec<String>,
    counters: Rc<Counters>,
}

impl CatalogConnection for FakeConnection {
    fn current_database(&self) -> Result<String, CatalogError> {
        Ok(self.name.clone())
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<QueryResult, CatalogError> {
        self.counters
            .statements
            .borrow_mut()
            .push((self.name.clone(), sql.to_string()));
        if sql == DATABASES_QUERY {
            return Ok(Some(
                self.server_databases
                    .iter()
                    .map(|name| cells(&[("datname", Some(name.as_str()))]))
                    .collect(),
            ));
        }
        self.database.answer(sql, params)
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.counters.live.set(self.counters.live.get() - 1);
    }
}

/// Names of the data jobs in `units`, in order.
pub fn job_names(units: &[WorkUnit]) -> Vec<String> {
    units
        .iter()
        .filter_map(|unit| match &unit.record {
            MetadataRecord::DataJob(job) => Some(job.name.clone()),
            _ => None,
        })
        .collect()
}

/// `(dataset urn, upstream urns)` of every lineage workunit, in order.
pub fn lineage(units: &[WorkUnit]) -> Vec<(String, Vec<String>)> {
    units
        .iter()
        .filter_map(|unit| match &unit.record {
            MetadataRecord::UpstreamLineage(lineage) => {
                Some((lineage.dataset.clone(), lineage.upstreams.clone()))
            }
            _ => None,
        })
        .collect()
}

pub fn dataset_urn(qualified_name: &str) -> String {
    format!("urn:li:dataset:(urn:li:dataPlatform:postgres,{qualified_name},PROD)")
}
