//! Metadata records produced by an extraction run.
//!
//! The shapes here are what the serialization layer receives. They carry URNs
//! and plain values only; how they are encoded on the wire is not decided here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContainerSubType, DatasetSubType, FieldType};

/// One unit of extracted metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    /// Stable identifier, unique within a run.
    pub id: String,
    pub record: MetadataRecord,
}

impl WorkUnit {
    pub fn new(id: impl Into<String>, record: MetadataRecord) -> Self {
        Self {
            id: id.into(),
            record,
        }
    }

    /// URN of the entity this workunit describes.
    pub fn entity_urn(&self) -> &str {
        match &self.record {
            MetadataRecord::Container(c) => &c.urn,
            MetadataRecord::Dataset(d) => &d.urn,
            MetadataRecord::UpstreamLineage(l) => &l.dataset,
            MetadataRecord::DataFlow(f) => &f.urn,
            MetadataRecord::DataJob(j) => &j.urn,
        }
    }
}

/// The payload of a workunit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MetadataRecord {
    Container(ContainerRecord),
    Dataset(DatasetRecord),
    UpstreamLineage(UpstreamLineageRecord),
    DataFlow(DataFlowRecord),
    DataJob(DataJobRecord),
}

/// A database or schema container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub urn: String,
    pub name: String,
    pub sub_type: ContainerSubType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Key properties the container guid was derived from.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// A table or view with its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    pub urn: String,
    /// Fully qualified `database.schema.entity` name.
    pub qualified_name: String,
    pub sub_type: DatasetSubType,
    /// URN of the schema container.
    pub container: String,
    pub fields: Vec<SchemaField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bytes: Option<i64>,
}

/// A column of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: String,
    /// Type as reported by the server, e.g. `character varying(40)`.
    pub native_type: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

/// Table-level lineage: `dataset` reads from every URN in `upstreams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamLineageRecord {
    pub dataset: String,
    pub upstreams: Vec<String>,
}

/// Container of the stored procedures of one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlowRecord {
    pub urn: String,
    pub name: String,
    /// URN of the schema container.
    pub container: String,
}

/// A single stored procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataJobRecord {
    pub urn: String,
    pub flow: String,
    pub name: String,
    pub language: String,
    pub argument_signature: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}
