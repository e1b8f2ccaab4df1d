//! Run orchestration.
//!
//! [`PostgresSource::workunits`] returns a lazy iterator. Each refill opens
//! one database, reflects every allowed schema and discovers its stored
//! procedures, then releases the connection. Once every database has been
//! reflected, and only if SQL parsing left views unresolved, a second pass
//! reconnects to each database and falls back to the dependency graph for
//! their lineage.

use std::collections::{BTreeSet, VecDeque};
use std::mem;

use tracing::{debug, info, info_span};

use crate::catalog::{
    target_databases, target_schemas, CatalogConnection, ConnectTarget, ConnectionFactory,
    DatabaseContext,
};
use crate::config::PostgresConfig;
use crate::emitter::{Emitter, UrnBuilder, WorkUnitEmitter};
use crate::error::SourceError;
use crate::identifier::IdentifierBuilder;
use crate::lineage::{emit_lineage, resolve_lineage};
use crate::procedure::fetch_procedures;
use crate::profile::ProfileMetadata;
use crate::reflector::{CatalogReflector, DefaultReflector, ReflectionScope};
use crate::report::{Reporter, SourceReport};
use crate::types::WorkUnit;

/// Extraction source for one PostgreSQL server.
pub struct PostgresSource<F, R = DefaultReflector, E = WorkUnitEmitter> {
    config: PostgresConfig,
    factory: F,
    reflector: R,
    emitter: E,
    identifiers: IdentifierBuilder,
    report: SourceReport,
    unresolved_views: BTreeSet<String>,
    profile: ProfileMetadata,
}

impl<F: ConnectionFactory> PostgresSource<F> {
    /// Source with the default reflector and emitter.
    pub fn new(config: PostgresConfig, factory: F) -> Self {
        let emitter = WorkUnitEmitter::new(UrnBuilder::new(
            config.platform_instance.clone(),
            config.env.clone(),
        ));
        Self::with_parts(config, factory, DefaultReflector::default(), emitter)
    }
}

impl<F, R, E> PostgresSource<F, R, E>
where
    F: ConnectionFactory,
    R: CatalogReflector,
    E: Emitter,
{
    pub fn with_parts(config: PostgresConfig, factory: F, reflector: R, emitter: E) -> Self {
        let identifiers = IdentifierBuilder::new(config.database.clone());
        Self {
            config,
            factory,
            reflector,
            emitter,
            identifiers,
            report: SourceReport::new(),
            unresolved_views: BTreeSet::new(),
            profile: ProfileMetadata::new(),
        }
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    pub fn report(&self) -> &SourceReport {
        &self.report
    }

    pub fn into_report(self) -> SourceReport {
        self.report
    }

    /// Views flagged by reflection as needing dependency-graph lineage.
    pub fn unresolved_views(&self) -> &BTreeSet<String> {
        &self.unresolved_views
    }

    pub fn profile_metadata(&self) -> &ProfileMetadata {
        &self.profile
    }

    /// Start a run. Nothing touches the server until the iterator is polled.
    pub fn workunits(&mut self) -> WorkUnits<'_, F, R, E> {
        WorkUnits {
            source: self,
            phase: Phase::Start,
            targets: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    fn open(&self, target: &ConnectTarget) -> Result<DatabaseContext<F::Connection>, SourceError> {
        DatabaseContext::open(&self.factory, target).map_err(|source| SourceError::Connect {
            database: target.to_string(),
            source,
        })
    }

    fn targets(&mut self) -> Result<Vec<ConnectTarget>, SourceError> {
        target_databases(&self.factory, &self.config, &mut self.report)
            .map_err(SourceError::Enumerate)
    }

    /// Generic reflection plus procedure discovery for one database.
    fn reflect_database(&mut self, target: &ConnectTarget) -> Result<Vec<WorkUnit>, SourceError> {
        let ctx = self.open(target)?;
        let span = info_span!("database", database = %ctx.database());
        let _entered = span.enter();

        self.report.databases_scanned += 1;
        if self.config.profile_table_sizes {
            self.profile.load(&ctx, &self.identifiers);
        }

        let schemas = match target_schemas(&ctx, &self.config, &mut self.report) {
            Ok(schemas) => schemas,
            Err(err) => {
                self.report.report_failure(
                    "Failed to list schemas",
                    "An error occurred while listing the schemas of the database.",
                    ctx.database(),
                    Some(&err),
                );
                Vec::new()
            }
        };
        self.report.schemas_scanned += schemas.len();

        let mut units = Vec::new();
        let mut procedures = 0;
        let mut scope = ReflectionScope {
            ctx: &ctx,
            config: &self.config,
            identifiers: &self.identifiers,
            emitter: &self.emitter,
            profile: &self.profile,
            reporter: &mut self.report,
            unresolved_views: &mut self.unresolved_views,
        };

        match self.reflector.on_platform_workunits(&mut scope) {
            Ok(platform) => units.extend(platform),
            Err(err) => scope.reporter.report_failure(
                "Failed to reflect database",
                "An error occurred while reading database level metadata.",
                ctx.database(),
                Some(&err),
            ),
        }

        for schema in &schemas {
            debug!(schema = %schema, "reflecting schema");
            match self.reflector.on_schema_level_work(&mut scope, schema) {
                Ok(reflected) => units.extend(reflected),
                Err(err) => scope.reporter.report_failure(
                    "Failed to reflect schema",
                    "An error occurred while reading tables and views of the schema.",
                    &format!("{}.{schema}", ctx.database()),
                    Some(&err),
                ),
            }

            if self.config.include_stored_procedures {
                let emitted = procedure_workunits(
                    &ctx,
                    schema,
                    &self.identifiers,
                    &self.config,
                    &self.emitter,
                    &mut *scope.reporter,
                );
                procedures += emitted.1;
                units.extend(emitted.0);
            }
        }

        self.report.procedures_scanned += procedures;
        info!(workunits = units.len(), "reflected database");
        Ok(units)
    }

    /// Dependency-graph lineage for the views of one database.
    fn lineage_database(&mut self, target: &ConnectTarget) -> Result<Vec<WorkUnit>, SourceError> {
        let ctx = self.open(target)?;
        let span = info_span!("lineage", database = %ctx.database());
        let _entered = span.enter();

        let group = resolve_lineage(&ctx, &self.identifiers, &self.config, &mut self.report)
            .map_err(|source| SourceError::Lineage {
                database: ctx.database().to_string(),
                source,
            })?;

        let unresolved = &self.unresolved_views;
        let records = emit_lineage(
            &group,
            &self.identifiers,
            &ctx,
            |view| unresolved.contains(view),
            self.config.view_lineage_gate,
        );

        let mut units = Vec::new();
        for record in &records {
            match self.emitter.lineage(record) {
                Ok(lineage) => units.extend(lineage),
                Err(err) => self.report.report_warning(
                    "Failed to emit view lineage",
                    "An error occurred while emitting lineage for the view.",
                    &record.target,
                    Some(&err),
                ),
            }
        }
        info!(
            views = group.len(),
            records = records.len(),
            "resolved view lineage"
        );
        Ok(units)
    }
}

/// Workunits for the stored procedures of one schema, and how many
/// procedures they cover.
fn procedure_workunits<C, E>(
    ctx: &DatabaseContext<C>,
    schema: &str,
    identifiers: &IdentifierBuilder,
    config: &PostgresConfig,
    emitter: &E,
    reporter: &mut dyn Reporter,
) -> (Vec<WorkUnit>, usize)
where
    C: CatalogConnection,
    E: Emitter + ?Sized,
{
    let procedures = fetch_procedures(ctx, schema, identifiers, config, reporter);
    if procedures.is_empty() {
        return (Vec::new(), 0);
    }

    let schema_key = emitter
        .urns()
        .schema_key(identifiers.database_name(ctx), schema);
    let db_key = schema_key.database.clone();

    let mut units = Vec::new();
    match emitter.procedure_containers(&db_key, &schema_key) {
        Ok(containers) => units.extend(containers),
        Err(err) => reporter.report_warning(
            "Failed to emit stored procedure container",
            "An error occurred while emitting the stored procedure container.",
            &schema_key.qualified(),
            Some(&err),
        ),
    }

    let mut emitted = 0;
    for procedure in &procedures {
        match emitter.procedure(procedure, &db_key, &schema_key) {
            Ok(job) => {
                units.extend(job);
                emitted += 1;
            }
            Err(err) => reporter.report_warning(
                "Failed to emit stored procedure",
                "An error occurred while emitting stored procedure.",
                &procedure.name,
                Some(&err),
            ),
        }
    }
    (units, emitted)
}

enum Phase {
    Start,
    Reflect(VecDeque<ConnectTarget>),
    LineageStart,
    Lineage(VecDeque<ConnectTarget>),
    Done,
}

/// Lazy stream of workunits. After a fatal error it yields that error once
/// and then ends.
pub struct WorkUnits<'a, F, R, E> {
    source: &'a mut PostgresSource<F, R, E>,
    phase: Phase,
    /// Databases enumerated at the start, reopened by the lineage pass.
    targets: Vec<ConnectTarget>,
    pending: VecDeque<WorkUnit>,
}

impl<F, R, E> WorkUnits<'_, F, R, E>
where
    F: ConnectionFactory,
    R: CatalogReflector,
    E: Emitter,
{
    /// Advance one step. Returns `false` once the run is over.
    fn refill(&mut self) -> Result<bool, SourceError> {
        match mem::replace(&mut self.phase, Phase::Done) {
            Phase::Start => {
                self.targets = self.source.targets()?;
                self.phase = Phase::Reflect(self.targets.iter().cloned().collect());
            }
            Phase::Reflect(mut targets) => match targets.pop_front() {
                Some(target) => {
                    self.pending.extend(self.source.reflect_database(&target)?);
                    self.phase = Phase::Reflect(targets);
                }
                None => self.phase = Phase::LineageStart,
            },
            Phase::LineageStart => {
                if self.source.config.include_view_lineage
                    && !self.source.unresolved_views.is_empty()
                {
                    debug!(
                        unresolved = self.source.unresolved_views.len(),
                        "starting dependency lineage pass"
                    );
                    self.phase = Phase::Lineage(self.targets.iter().cloned().collect());
                }
            }
            Phase::Lineage(mut targets) => {
                if let Some(target) = targets.pop_front() {
                    self.pending.extend(self.source.lineage_database(&target)?);
                    self.phase = Phase::Lineage(targets);
                }
            }
            Phase::Done => return Ok(false),
        }
        Ok(true)
    }
}

impl<F, R, E> Iterator for WorkUnits<'_, F, R, E>
where
    F: ConnectionFactory,
    R: CatalogReflector,
    E: Emitter,
{
    type Item = Result<WorkUnit, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(unit) = self.pending.pop_front() {
                self.source.report.record_workunit(&unit);
                return Some(Ok(unit));
            }
            match self.refill() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(err) => {
                    self.phase = Phase::Done;
                    return Some(Err(err));
                }
            }
        }
    }
}
