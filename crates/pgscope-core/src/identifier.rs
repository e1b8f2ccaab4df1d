//! Fully qualified `database.schema.entity` identifiers.

/// Name of the database a live catalog connection is attached to.
pub trait CurrentDatabase {
    fn current_database(&self) -> &str;
}

impl CurrentDatabase for str {
    fn current_database(&self) -> &str {
        self
    }
}

impl CurrentDatabase for String {
    fn current_database(&self) -> &str {
        self
    }
}

/// Builds the identifiers used as join keys for filtering and lineage.
///
/// When a database was configured for the whole run its name is used
/// verbatim; otherwise the connection's current database is asked. Names are
/// concatenated as reported by the catalog, without quoting or case folding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierBuilder {
    configured_database: Option<String>,
}

impl IdentifierBuilder {
    pub fn new(configured_database: Option<String>) -> Self {
        Self {
            configured_database,
        }
    }

    /// The database segment used for identifiers built against `current`.
    pub fn database_name<'a, C>(&'a self, current: &'a C) -> &'a str
    where
        C: CurrentDatabase + ?Sized,
    {
        match &self.configured_database {
            Some(database) => database,
            None => current.current_database(),
        }
    }

    pub fn identify<C>(&self, schema: &str, entity: &str, current: &C) -> String
    where
        C: CurrentDatabase + ?Sized,
    {
        format!("{}.{schema}.{entity}", self.database_name(current))
    }
}
