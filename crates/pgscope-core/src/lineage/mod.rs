//! Fallback view lineage from the catalog's dependency graph.
//!
//! Views whose SQL definition could not be parsed still have their
//! dependencies recorded by the server. This module reads those dependencies
//! in a single recursive query per database, groups them by dependent view and
//! turns each group into a lineage record.

mod query;

pub use query::VIEW_LINEAGE_QUERY;

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogConnection, CatalogRow, DatabaseContext};
use crate::error::LineageError;
use crate::identifier::{CurrentDatabase, IdentifierBuilder};
use crate::pattern::Matcher;
use crate::report::Reporter;

/// "`dependent_view` reads from `source_table`", both scoped by schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineageEdge {
    pub source_table: String,
    pub source_schema: String,
    pub dependent_view: String,
    pub dependent_schema: String,
}

impl LineageEdge {
    const COLUMNS: usize = 4;

    /// Decode a row of [`VIEW_LINEAGE_QUERY`] by position.
    ///
    /// `index` is only used to locate the row in the error.
    pub fn from_row(row: &CatalogRow, index: usize) -> Result<Self, LineageError> {
        if row.len() != Self::COLUMNS {
            return Err(LineageError::MalformedRow {
                row: index,
                reason: format!("expected {} columns, found {}", Self::COLUMNS, row.len()),
            });
        }

        let value = |position: usize, column: &str| {
            row.get(position)
                .map(str::to_string)
                .ok_or_else(|| LineageError::MalformedRow {
                    row: index,
                    reason: format!("{column} is NULL"),
                })
        };

        Ok(Self {
            source_table: value(0, "source_table")?,
            source_schema: value(1, "source_schema")?,
            dependent_view: value(2, "dependent_view")?,
            dependent_schema: value(3, "dependent_schema")?,
        })
    }

    fn dependent(&self) -> DependentView {
        DependentView {
            view: self.dependent_view.clone(),
            schema: self.dependent_schema.clone(),
        }
    }
}

/// Grouping key: the unqualified view name and its schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependentView {
    pub view: String,
    pub schema: String,
}

impl DependentView {
    pub fn new(view: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            schema: schema.into(),
        }
    }
}

/// Fully qualified sources per dependent view.
///
/// Keys appear at most once and only when at least one edge survived
/// filtering. Sources keep the order of the dependency query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineageGroup {
    entries: IndexMap<DependentView, Vec<String>>,
}

impl LineageGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sources(&self, view: &str, schema: &str) -> Option<&[String]> {
        self.entries
            .get(&DependentView::new(view, schema))
            .map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DependentView, &[String])> {
        self.entries.iter().map(|(key, sources)| (key, sources.as_slice()))
    }

    fn push(&mut self, key: DependentView, source: String) {
        self.entries.entry(key).or_default().push(source);
    }
}

/// What the emitter does when it meets a view that was already resolved
/// from its SQL definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageGate {
    /// Skip that view and keep going.
    #[default]
    SkipResolved,
    /// Stop emitting for the rest of the database's group.
    StopAtFirstResolved,
}

/// Lineage for one view: `target` reads from every identifier in `sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageRecord {
    pub sources: Vec<String>,
    pub target: String,
}

/// Group decoded edges by dependent view.
///
/// Edges whose dependent view or dependent schema is denied are dropped; each
/// denied view is reported once. Source identifiers are qualified with the
/// database `current` resolves to. Source schemas are not filtered.
pub fn group_edges<I, C, M>(
    edges: I,
    identifiers: &IdentifierBuilder,
    current: &C,
    matcher: &M,
    reporter: &mut dyn Reporter,
) -> LineageGroup
where
    I: IntoIterator<Item = LineageEdge>,
    C: CurrentDatabase + ?Sized,
    M: Matcher + ?Sized,
{
    let mut group = LineageGroup::new();
    let mut dropped: HashSet<DependentView> = HashSet::new();

    for edge in edges {
        let key = edge.dependent();
        if !matcher.view_allowed(&edge.dependent_view)
            || !matcher.schema_allowed(&edge.dependent_schema)
        {
            if dropped.insert(key) {
                reporter.report_dropped(&identifiers.identify(
                    &edge.dependent_schema,
                    &edge.dependent_view,
                    current,
                ));
            }
            continue;
        }

        let source = identifiers.identify(&edge.source_schema, &edge.source_table, current);
        group.push(key, source);
    }

    group
}

/// Read the dependency graph of the connected database and group it.
///
/// A statement without a result set yields an empty group. A row that does not
/// decode into a [`LineageEdge`] fails the whole call.
pub fn resolve_lineage<C, M>(
    ctx: &DatabaseContext<C>,
    identifiers: &IdentifierBuilder,
    matcher: &M,
    reporter: &mut dyn Reporter,
) -> Result<LineageGroup, LineageError>
where
    C: CatalogConnection,
    M: Matcher + ?Sized,
{
    let Some(rows) = ctx.query(VIEW_LINEAGE_QUERY, &[])? else {
        debug!(database = ctx.database(), "dependency query returned no result set");
        return Ok(LineageGroup::new());
    };

    let edges = rows
        .iter()
        .enumerate()
        .map(|(index, row)| LineageEdge::from_row(row, index))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        database = ctx.database(),
        edges = edges.len(),
        "read view dependencies"
    );

    Ok(group_edges(edges, identifiers, ctx, matcher, reporter))
}

/// Turn a group into lineage records for views that SQL parsing left unresolved.
///
/// `is_view_unresolved` receives the view's fully qualified identifier. What
/// happens at the first resolved view depends on `gate`.
pub fn emit_lineage<C, F>(
    group: &LineageGroup,
    identifiers: &IdentifierBuilder,
    current: &C,
    is_view_unresolved: F,
    gate: LineageGate,
) -> Vec<LineageRecord>
where
    C: CurrentDatabase + ?Sized,
    F: Fn(&str) -> bool,
{
    let mut records = Vec::new();

    for (key, sources) in group.iter() {
        let target = identifiers.identify(&key.schema, &key.view, current);
        if !is_view_unresolved(&target) {
            match gate {
                LineageGate::SkipResolved => continue,
                LineageGate::StopAtFirstResolved => break,
            }
        }
        records.push(LineageRecord {
            sources: sources.to_vec(),
            target,
        });
    }

    records
}
