//! Per-database table size cache used to enrich dataset records.

use std::collections::HashMap;

use tracing::{debug, error};

use crate::catalog::{CatalogConnection, DatabaseContext};
use crate::identifier::IdentifierBuilder;

/// On-disk size of every table, materialized view and foreign table outside
/// the system schemas.
pub const TABLE_SIZES_QUERY: &str = r#"
SELECT
    n.nspname::text AS schema_name,
    c.relname::text AS table_name,
    pg_table_size(c.oid)::text AS size_bytes
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind IN ('r', 'p', 'm', 'f')
    AND n.nspname NOT IN ('pg_catalog', 'information_schema')
    AND n.nspname NOT LIKE 'pg\_toast%'
"#;

/// Table sizes keyed by fully qualified identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileMetadata {
    storage_bytes: HashMap<String, i64>,
}

impl ProfileMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the cache from the connected database.
    ///
    /// Any error is logged and leaves the entries loaded so far in place; the
    /// rest of the run does not depend on this step.
    pub fn load<C: CatalogConnection>(
        &mut self,
        ctx: &DatabaseContext<C>,
        identifiers: &IdentifierBuilder,
    ) {
        let rows = match ctx.query(TABLE_SIZES_QUERY, &[]) {
            Ok(rows) => rows.unwrap_or_default(),
            Err(err) => {
                error!(database = ctx.database(), error = %err, "failed to profile table sizes");
                return;
            }
        };

        let mut loaded = 0usize;
        for row in &rows {
            let (Some(schema), Some(table), Some(size)) = (
                row.get_named("schema_name"),
                row.get_named("table_name"),
                row.get_named("size_bytes"),
            ) else {
                continue;
            };
            let Ok(size) = size.parse::<i64>() else {
                error!(
                    database = ctx.database(),
                    schema, table, size, "unparseable table size, abandoning profiling"
                );
                return;
            };
            self.storage_bytes
                .insert(identifiers.identify(schema, table, ctx), size);
            loaded += 1;
        }
        debug!(database = ctx.database(), loaded, "profiled table sizes");
    }

    pub fn storage_bytes(&self, qualified_name: &str) -> Option<i64> {
        self.storage_bytes.get(qualified_name).copied()
    }

    pub fn len(&self) -> usize {
        self.storage_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage_bytes.is_empty()
    }
}
