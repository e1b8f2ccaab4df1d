//! Types shared by reporting and emission.

use serde::{Deserialize, Serialize};

/// Severity of a structured report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The entity was skipped but the run is healthy.
    Warning,
    /// Part of the catalog could not be extracted.
    Failure,
}

/// A warning or failure recorded while the run continued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredLogEntry {
    pub severity: Severity,

    /// Short, stable headline used to group similar entries.
    pub title: String,

    /// Human-readable description of what went wrong.
    pub message: String,

    /// Entity the entry is scoped to, e.g. `database.schema` or a procedure name.
    pub context: String,

    /// Rendered underlying error, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Kind of a container record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerSubType {
    Database,
    Schema,
}

/// Kind of a dataset record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DatasetSubType {
    Table,
    View,
    MaterializedView,
    ForeignTable,
}

impl DatasetSubType {
    /// Map a `pg_class.relkind` code to a dataset kind.
    pub fn from_relkind(relkind: &str) -> Option<Self> {
        match relkind {
            "r" | "p" => Some(Self::Table),
            "v" => Some(Self::View),
            "m" => Some(Self::MaterializedView),
            "f" => Some(Self::ForeignTable),
            _ => None,
        }
    }

    pub fn is_view(self) -> bool {
        matches!(self, Self::View | Self::MaterializedView)
    }
}

/// Normalized column type used by the downstream catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Boolean,
    Number,
    String,
    Bytes,
    Date,
    Time,
    Enum,
    Array,
    Map,
    Record,
    Null,
}
