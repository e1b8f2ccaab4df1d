pub mod catalog;
pub mod config;
pub mod emitter;
pub mod error;
pub mod identifier;
pub mod lineage;
pub mod pattern;
pub mod procedure;
pub mod profile;
pub mod reflector;
pub mod report;
pub mod source;
pub mod type_registry;
pub mod types;

// Re-export main types and functions
pub use catalog::{
    target_databases, target_schemas, CatalogConnection, CatalogRow, ConnectTarget,
    ConnectionFactory, DatabaseContext, QueryResult,
};
pub use config::{ConfigError, PostgresConfig};
pub use emitter::{DatabaseKey, Emitter, SchemaKey, UrnBuilder, WorkUnitEmitter};
pub use error::{CatalogError, EmitError, LineageError, ProcedureError, SourceError};
pub use identifier::{CurrentDatabase, IdentifierBuilder};
pub use lineage::{
    emit_lineage, group_edges, resolve_lineage, DependentView, LineageEdge, LineageGate,
    LineageGroup, LineageRecord,
};
pub use pattern::{AllowDenyPattern, Matcher};
pub use procedure::{fetch_procedures, ProcedureDescriptor};
pub use profile::ProfileMetadata;
pub use reflector::{CatalogReflector, DefaultReflector, ReflectionScope};
pub use report::{Reporter, SourceReport};
pub use source::{PostgresSource, WorkUnits};
pub use type_registry::TypeRegistry;
pub use types::{MetadataRecord, StructuredLogEntry, WorkUnit};

// Test utilities (must be at end of file)
#[cfg(test)]
pub mod test_utils;
