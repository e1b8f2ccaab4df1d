//! Error types for catalog access and metadata extraction.
//!
//! # Error Handling Strategy
//!
//! The crate separates run-level failures from per-entity problems:
//!
//! - [`SourceError`]: Fatal conditions that end the extraction run. Only two
//!   things qualify: failing to open or validate a database connection, and a
//!   view dependency row that does not have the expected shape.
//!
//! - [`crate::report::SourceReport`]: Non-fatal drops, warnings and failures
//!   collected while walking databases, schemas and procedures. A broken schema
//!   or procedure is recorded there and the run moves on.

use thiserror::Error;

/// Errors raised by a [`crate::catalog::CatalogConnection`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The connection could not be opened or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server rejected or failed to execute a statement.
    #[error("Query error: {0}")]
    Query(String),

    /// A value in the result set could not be decoded as text.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// A view dependency row did not match the fixed four-column layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    #[error("Malformed view dependency row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("View dependency query failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure while listing or decoding stored procedures for one schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcedureError {
    #[error("Procedure row {row} is missing column '{column}'")]
    MissingColumn { row: usize, column: &'static str },

    #[error("Procedure query failed: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure while turning an extracted entity into workunits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("Invalid stored procedure: {0}")]
    InvalidProcedure(String),

    #[error("Invalid lineage record for {target}: {reason}")]
    InvalidLineage { target: String, reason: String },
}

/// Fatal error that aborts the workunit stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Failed to connect to database {database}: {source}")]
    Connect {
        database: String,
        #[source]
        source: CatalogError,
    },

    #[error("Failed to enumerate databases: {0}")]
    Enumerate(#[source] CatalogError),

    #[error("View lineage extraction failed for database {database}: {source}")]
    Lineage {
        database: String,
        #[source]
        source: LineageError,
    },
}
