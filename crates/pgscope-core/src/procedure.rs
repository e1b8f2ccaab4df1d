//! Stored procedure discovery.
//!
//! Procedures are listed per schema. Whatever goes wrong while listing them
//! is reported as a warning scoped to `database.schema` and the schema is
//! treated as having no procedures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogConnection, CatalogRow, DatabaseContext};
use crate::error::ProcedureError;
use crate::identifier::IdentifierBuilder;
use crate::pattern::Matcher;
use crate::report::Reporter;

/// Procedures (not functions) of the schema bound to `$1`.
pub const PROCEDURES_QUERY: &str = r#"
SELECT
    p.proname::text AS name,
    l.lanname::text AS language,
    pg_get_function_arguments(p.oid) AS arguments,
    pg_get_functiondef(p.oid) AS definition,
    obj_description(p.oid, 'pg_proc') AS comment
FROM pg_proc p
JOIN pg_namespace n ON n.oid = p.pronamespace
JOIN pg_language l ON l.oid = p.prolang
WHERE p.prokind = 'p'
    AND n.nspname = $1
"#;

/// A stored procedure found in one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureDescriptor {
    pub name: String,
    pub language: String,
    pub argument_signature: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Procedures have no return type; kept for parity with functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_properties: Option<BTreeMap<String, String>>,
}

impl ProcedureDescriptor {
    /// Decode a row of [`PROCEDURES_QUERY`] by column name.
    ///
    /// `name` and `language` must be present and non-NULL. A NULL argument
    /// list or definition decodes as an empty string.
    pub fn from_row(row: &CatalogRow, index: usize) -> Result<Self, ProcedureError> {
        let required = |column: &'static str| {
            row.get_named(column)
                .map(str::to_string)
                .ok_or(ProcedureError::MissingColumn { row: index, column })
        };
        let text = |column: &'static str| {
            if row.has_column(column) {
                Ok(row.get_named(column).unwrap_or_default().to_string())
            } else {
                Err(ProcedureError::MissingColumn { row: index, column })
            }
        };

        Ok(Self {
            name: required("name")?,
            language: required("language")?,
            argument_signature: text("arguments")?,
            definition: text("definition")?,
            comment: row.get_named("comment").map(str::to_string),
            return_type: None,
            created_at: None,
            altered_at: None,
            extra_properties: None,
        })
    }
}

/// List the procedures of `schema` without filtering.
pub fn list_procedures<C: CatalogConnection>(
    ctx: &DatabaseContext<C>,
    schema: &str,
) -> Result<Vec<ProcedureDescriptor>, ProcedureError> {
    let rows = ctx.query(PROCEDURES_QUERY, &[schema])?.unwrap_or_default();
    rows.iter()
        .enumerate()
        .map(|(index, row)| ProcedureDescriptor::from_row(row, index))
        .collect()
}

/// Procedures of `schema` allowed by the matcher, in catalog order.
///
/// Never fails: a listing error is reported as a warning and yields an empty
/// list. Denied procedures are reported dropped by qualified name.
pub fn fetch_procedures<C, M>(
    ctx: &DatabaseContext<C>,
    schema: &str,
    identifiers: &IdentifierBuilder,
    matcher: &M,
    reporter: &mut dyn Reporter,
) -> Vec<ProcedureDescriptor>
where
    C: CatalogConnection,
    M: Matcher + ?Sized,
{
    let raw = match list_procedures(ctx, schema) {
        Ok(raw) => raw,
        Err(err) => {
            reporter.report_warning(
                "Failed to get procedures for schema",
                "An error occurred while fetching procedures for the schema.",
                &format!("{}.{schema}", ctx.database()),
                Some(&err),
            );
            return Vec::new();
        }
    };

    let total = raw.len();
    let procedures: Vec<_> = raw
        .into_iter()
        .filter(|procedure| {
            let qualified = identifiers.identify(schema, &procedure.name, ctx);
            let allowed = matcher.procedure_allowed(&qualified);
            if !allowed {
                reporter.report_dropped(&qualified);
            }
            allowed
        })
        .collect();

    debug!(
        database = ctx.database(),
        schema,
        total,
        kept = procedures.len(),
        "listed stored procedures"
    );
    procedures
}
