//! Generic catalog reflection: containers, tables, views and their columns.
//!
//! The source drives a [`CatalogReflector`] once per database and once per
//! allowed schema. The default implementation reads `pg_class` and
//! `pg_attribute` and resolves view lineage from the view's SQL text. Views
//! whose text cannot be parsed are recorded in the run's unresolved set so the
//! dependency-graph resolver can cover them later.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::ControlFlow;

use sqlparser::ast::{ObjectName, ObjectNamePart, Query, TableFactor, Visit, Visitor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::catalog::{CatalogConnection, CatalogRow, DatabaseContext};
use crate::config::PostgresConfig;
use crate::emitter::Emitter;
use crate::error::CatalogError;
use crate::identifier::IdentifierBuilder;
use crate::lineage::LineageRecord;
use crate::pattern::Matcher;
use crate::profile::ProfileMetadata;
use crate::report::Reporter;
use crate::type_registry::TypeRegistry;
use crate::types::{DatasetRecord, DatasetSubType, MetadataRecord, SchemaField, WorkUnit};

/// Relations of the schema bound to `$1`.
pub const RELATIONS_QUERY: &str = r#"
SELECT
    c.relname::text AS name,
    c.relkind::text AS relkind,
    obj_description(c.oid, 'pg_class') AS description,
    CASE WHEN c.relkind IN ('v', 'm') THEN pg_get_viewdef(c.oid) END AS view_definition
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1
    AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
ORDER BY c.relname
"#;

/// Columns of every relation in the schema bound to `$1`, in ordinal order.
pub const COLUMNS_QUERY: &str = r#"
SELECT
    c.relname::text AS table_name,
    a.attname::text AS column_name,
    format_type(a.atttypid, a.atttypmod) AS data_type,
    (NOT a.attnotnull)::text AS nullable
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1
    AND a.attnum > 0
    AND NOT a.attisdropped
    AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
ORDER BY c.relname, a.attnum
"#;

const SYSTEM_SCHEMAS: [&str; 2] = ["pg_catalog", "information_schema"];
const DEFAULT_SCHEMA: &str = "public";

/// Everything a reflector needs while working on one database.
pub struct ReflectionScope<'a, C> {
    pub ctx: &'a DatabaseContext<C>,
    pub config: &'a PostgresConfig,
    pub identifiers: &'a IdentifierBuilder,
    pub emitter: &'a dyn Emitter,
    pub profile: &'a ProfileMetadata,
    pub reporter: &'a mut dyn Reporter,
    /// Fully qualified views whose lineage could not be derived from SQL.
    pub unresolved_views: &'a mut BTreeSet<String>,
}

/// Extension points called by the source for each database and schema.
pub trait CatalogReflector {
    /// Workunits describing the database itself, emitted before any schema.
    fn on_platform_workunits<C: CatalogConnection>(
        &self,
        scope: &mut ReflectionScope<'_, C>,
    ) -> Result<Vec<WorkUnit>, CatalogError>;

    /// Workunits for one allowed schema.
    fn on_schema_level_work<C: CatalogConnection>(
        &self,
        scope: &mut ReflectionScope<'_, C>,
        schema: &str,
    ) -> Result<Vec<WorkUnit>, CatalogError>;
}

/// Reflects containers, tables and views from the system catalogs.
#[derive(Debug, Clone, Default)]
pub struct DefaultReflector {
    types: TypeRegistry,
}

impl DefaultReflector {
    pub fn new(types: TypeRegistry) -> Self {
        Self { types }
    }

    fn columns<C: CatalogConnection>(
        &self,
        ctx: &DatabaseContext<C>,
        schema: &str,
    ) -> Result<HashMap<String, Vec<SchemaField>>, CatalogError> {
        let rows = ctx.query(COLUMNS_QUERY, &[schema])?.unwrap_or_default();
        let mut columns: HashMap<String, Vec<SchemaField>> = HashMap::new();
        for row in &rows {
            let (Some(table), Some(name)) = (row.get_named("table_name"), row.get_named("column_name"))
            else {
                continue;
            };
            let native_type = row.get_named("data_type").unwrap_or_default();
            columns.entry(table.to_string()).or_default().push(SchemaField {
                name: name.to_string(),
                native_type: native_type.to_string(),
                field_type: self.types.resolve(native_type),
                nullable: row.get_named("nullable") != Some("false"),
            });
        }
        Ok(columns)
    }
}

impl CatalogReflector for DefaultReflector {
    fn on_platform_workunits<C: CatalogConnection>(
        &self,
        scope: &mut ReflectionScope<'_, C>,
    ) -> Result<Vec<WorkUnit>, CatalogError> {
        let database = scope.identifiers.database_name(scope.ctx);
        let key = scope.emitter.urns().database_key(database);
        Ok(vec![scope.emitter.database_container(&key)])
    }

    fn on_schema_level_work<C: CatalogConnection>(
        &self,
        scope: &mut ReflectionScope<'_, C>,
        schema: &str,
    ) -> Result<Vec<WorkUnit>, CatalogError> {
        let database = scope.identifiers.database_name(scope.ctx).to_string();
        let schema_key = scope.emitter.urns().schema_key(&database, schema);
        let container = scope.emitter.urns().container(&schema_key.guid());
        let mut units = vec![scope.emitter.schema_container(&schema_key)];

        let config = scope.config;
        if !config.include_tables && !config.include_views {
            return Ok(units);
        }

        let relations = scope.ctx.query(RELATIONS_QUERY, &[schema])?.unwrap_or_default();
        let mut columns = self.columns(scope.ctx, schema)?;

        for row in &relations {
            let Some(relation) = Relation::from_row(row) else {
                continue;
            };
            let qualified = scope.identifiers.identify(schema, &relation.name, scope.ctx);

            let wanted = if relation.sub_type.is_view() {
                config.include_views && config.view_allowed(&qualified)
            } else {
                config.include_tables && config.table_allowed(&qualified)
            };
            if !wanted {
                scope.reporter.report_dropped(&qualified);
                continue;
            }

            let urn = scope.emitter.urns().dataset(&qualified);
            units.push(WorkUnit::new(
                format!("{urn}-dataset"),
                MetadataRecord::Dataset(DatasetRecord {
                    urn,
                    qualified_name: qualified.clone(),
                    sub_type: relation.sub_type,
                    container: container.clone(),
                    fields: columns.remove(&relation.name).unwrap_or_default(),
                    description: relation.description.clone(),
                    view_definition: relation.view_definition.clone(),
                    storage_bytes: scope.profile.storage_bytes(&qualified),
                }),
            ));

            let Some(definition) = relation.view_definition.as_deref() else {
                continue;
            };
            match view_sources(definition) {
                Some(sources) if !sources.is_empty() => {
                    let record = LineageRecord {
                        sources: sources
                            .iter()
                            .map(|(source_schema, table)| {
                                scope.identifiers.identify(source_schema, table, scope.ctx)
                            })
                            .collect(),
                        target: qualified,
                    };
                    match scope.emitter.lineage(&record) {
                        Ok(lineage) => units.extend(lineage),
                        Err(err) => scope.reporter.report_warning(
                            "Failed to emit view lineage",
                            "Lineage parsed from the view definition could not be emitted.",
                            &record.target,
                            Some(&err),
                        ),
                    }
                }
                Some(_) => {}
                None => {
                    debug!(view = %qualified, "view definition did not parse");
                    scope.unresolved_views.insert(qualified);
                }
            }
        }

        Ok(units)
    }
}

struct Relation {
    name: String,
    sub_type: DatasetSubType,
    description: Option<String>,
    view_definition: Option<String>,
}

impl Relation {
    fn from_row(row: &CatalogRow) -> Option<Self> {
        Some(Self {
            name: row.get_named("name")?.to_string(),
            sub_type: DatasetSubType::from_relkind(row.get_named("relkind")?)?,
            description: row.get_named("description").map(str::to_string),
            view_definition: row.get_named("view_definition").map(str::to_string),
        })
    }
}

/// Relations a view body reads from, as `(schema, table)` pairs in first-seen
/// order.
///
/// Returns `None` when the text does not parse. Unqualified names resolve to
/// `public`; CTE names and system schemas are left out.
pub fn view_sources(definition: &str) -> Option<Vec<(String, String)>> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, definition).ok()?;

    let mut collector = RelationCollector::default();
    for statement in &statements {
        let _ = statement.visit(&mut collector);
    }

    let mut seen = HashSet::new();
    let sources = collector
        .relations
        .iter()
        .filter_map(|name| {
            let parts: Vec<String> = name.0.iter().map(part_value).collect();
            match parts.as_slice() {
                [table] if collector.ctes.contains(table) => None,
                [table] => Some((DEFAULT_SCHEMA.to_string(), table.clone())),
                [.., schema, table] => Some((schema.clone(), table.clone())),
                [] => None,
            }
        })
        .filter(|(schema, _)| !SYSTEM_SCHEMAS.contains(&schema.as_str()))
        .filter(|source| seen.insert(source.clone()))
        .collect();
    Some(sources)
}

fn part_value(part: &ObjectNamePart) -> String {
    part.as_ident()
        .map(|ident| ident.value.clone())
        .unwrap_or_else(|| part.to_string())
}

#[derive(Default)]
struct RelationCollector {
    relations: Vec<ObjectName>,
    ctes: HashSet<String>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.ctes.insert(cte.alias.name.value.clone());
            }
        }
        ControlFlow::Continue(())
    }

    // Table-valued functions such as `generate_series(...)` carry args and
    // are not relations.
    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Self::Break> {
        if let TableFactor::Table {
            name, args: None, ..
        } = factor
        {
            self.relations.push(name.clone());
        }
        ControlFlow::Continue(())
    }
}
