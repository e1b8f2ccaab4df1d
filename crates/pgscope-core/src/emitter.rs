//! Conversion of extracted entities into workunits.
//!
//! URNs follow the DataHub conventions so the output can be loaded by the
//! same downstream tooling:
//!
//! - dataset: `urn:li:dataset:(urn:li:dataPlatform:postgres,[instance.]db.schema.name,ENV)`
//! - container: `urn:li:container:<guid>`
//! - data flow: `urn:li:dataFlow:(postgres,[instance.]db.schema.stored_procedures,ENV)`
//! - data job: `urn:li:dataJob:(<flow urn>,<procedure name>)`

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::error::EmitError;
use crate::lineage::LineageRecord;
use crate::procedure::ProcedureDescriptor;
use crate::types::{
    ContainerRecord, ContainerSubType, DataFlowRecord, DataJobRecord, MetadataRecord,
    UpstreamLineageRecord, WorkUnit,
};

pub const PLATFORM: &str = "postgres";

/// Builds URNs for one platform instance and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrnBuilder {
    platform: String,
    platform_instance: Option<String>,
    env: String,
}

impl UrnBuilder {
    pub fn new(platform_instance: Option<String>, env: impl Into<String>) -> Self {
        Self {
            platform: PLATFORM.to_string(),
            platform_instance,
            env: env.into(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    fn with_instance(&self, name: &str) -> String {
        match &self.platform_instance {
            Some(instance) => format!("{instance}.{name}"),
            None => name.to_string(),
        }
    }

    /// URN of a dataset given its `database.schema.entity` identifier.
    pub fn dataset(&self, qualified_name: &str) -> String {
        format!(
            "urn:li:dataset:(urn:li:dataPlatform:{},{},{})",
            self.platform,
            self.with_instance(qualified_name),
            self.env
        )
    }

    pub fn container(&self, guid: &str) -> String {
        format!("urn:li:container:{guid}")
    }

    pub fn data_flow(&self, flow_id: &str) -> String {
        format!(
            "urn:li:dataFlow:({},{},{})",
            self.platform,
            self.with_instance(flow_id),
            self.env
        )
    }

    pub fn data_job(&self, flow_urn: &str, job_id: &str) -> String {
        format!("urn:li:dataJob:({flow_urn},{job_id})")
    }

    pub fn database_key(&self, database: &str) -> DatabaseKey {
        DatabaseKey {
            platform: self.platform.clone(),
            instance: self.platform_instance.clone(),
            env: self.env.clone(),
            database: database.to_string(),
        }
    }

    pub fn schema_key(&self, database: &str, schema: &str) -> SchemaKey {
        SchemaKey {
            database: self.database_key(database),
            schema: schema.to_string(),
        }
    }
}

/// Identity of a database container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseKey {
    pub platform: String,
    pub instance: Option<String>,
    pub env: String,
    pub database: String,
}

impl DatabaseKey {
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("platform".to_string(), self.platform.clone());
        if let Some(instance) = &self.instance {
            props.insert("instance".to_string(), instance.clone());
        }
        props.insert("env".to_string(), self.env.clone());
        props.insert("database".to_string(), self.database.clone());
        props
    }

    pub fn guid(&self) -> String {
        guid(&self.properties())
    }
}

/// Identity of a schema container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub database: DatabaseKey,
    pub schema: String,
}

impl SchemaKey {
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut props = self.database.properties();
        props.insert("schema".to_string(), self.schema.clone());
        props
    }

    pub fn guid(&self) -> String {
        guid(&self.properties())
    }

    /// `database.schema`, the scope used in identifiers and flow ids.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.database.database, self.schema)
    }
}

/// Deterministic 32 hex digit id of a sorted property map.
fn guid(properties: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in properties {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Turns extracted entities into workunits.
pub trait Emitter {
    fn urns(&self) -> &UrnBuilder;

    fn database_container(&self, key: &DatabaseKey) -> WorkUnit;

    fn schema_container(&self, key: &SchemaKey) -> WorkUnit;

    /// Upstream lineage for one view.
    fn lineage(&self, record: &LineageRecord) -> Result<Vec<WorkUnit>, EmitError>;

    /// The data flow grouping the stored procedures of one schema.
    fn procedure_containers(
        &self,
        db_key: &DatabaseKey,
        schema_key: &SchemaKey,
    ) -> Result<Vec<WorkUnit>, EmitError>;

    fn procedure(
        &self,
        descriptor: &ProcedureDescriptor,
        db_key: &DatabaseKey,
        schema_key: &SchemaKey,
    ) -> Result<Vec<WorkUnit>, EmitError>;
}

/// Default [`Emitter`] producing DataHub-style records.
#[derive(Debug, Clone)]
pub struct WorkUnitEmitter {
    urns: UrnBuilder,
}

impl WorkUnitEmitter {
    pub fn new(urns: UrnBuilder) -> Self {
        Self { urns }
    }

    fn flow_urn(&self, schema_key: &SchemaKey) -> String {
        self.urns
            .data_flow(&format!("{}.stored_procedures", schema_key.qualified()))
    }
}

impl Emitter for WorkUnitEmitter {
    fn urns(&self) -> &UrnBuilder {
        &self.urns
    }

    fn database_container(&self, key: &DatabaseKey) -> WorkUnit {
        let urn = self.urns.container(&key.guid());
        WorkUnit::new(
            format!("container-{}", key.database),
            MetadataRecord::Container(ContainerRecord {
                urn,
                name: key.database.clone(),
                sub_type: ContainerSubType::Database,
                parent: None,
                properties: key.properties(),
            }),
        )
    }

    fn schema_container(&self, key: &SchemaKey) -> WorkUnit {
        let urn = self.urns.container(&key.guid());
        let parent = self.urns.container(&key.database.guid());
        WorkUnit::new(
            format!("container-{}", key.qualified()),
            MetadataRecord::Container(ContainerRecord {
                urn,
                name: key.schema.clone(),
                sub_type: ContainerSubType::Schema,
                parent: Some(parent),
                properties: key.properties(),
            }),
        )
    }

    fn lineage(&self, record: &LineageRecord) -> Result<Vec<WorkUnit>, EmitError> {
        if record.sources.is_empty() {
            return Err(EmitError::InvalidLineage {
                target: record.target.clone(),
                reason: "no upstream sources".to_string(),
            });
        }

        let dataset = self.urns.dataset(&record.target);
        let upstreams = record
            .sources
            .iter()
            .map(|source| self.urns.dataset(source))
            .collect();
        Ok(vec![WorkUnit::new(
            format!("{dataset}-upstreamLineage"),
            MetadataRecord::UpstreamLineage(UpstreamLineageRecord { dataset, upstreams }),
        )])
    }

    fn procedure_containers(
        &self,
        _db_key: &DatabaseKey,
        schema_key: &SchemaKey,
    ) -> Result<Vec<WorkUnit>, EmitError> {
        let urn = self.flow_urn(schema_key);
        Ok(vec![WorkUnit::new(
            format!("{urn}-dataFlowInfo"),
            MetadataRecord::DataFlow(DataFlowRecord {
                urn,
                name: format!("{}.stored_procedures", schema_key.qualified()),
                container: self.urns.container(&schema_key.guid()),
            }),
        )])
    }

    fn procedure(
        &self,
        descriptor: &ProcedureDescriptor,
        _db_key: &DatabaseKey,
        schema_key: &SchemaKey,
    ) -> Result<Vec<WorkUnit>, EmitError> {
        if descriptor.name.trim().is_empty() {
            return Err(EmitError::InvalidProcedure(format!(
                "procedure in {} has an empty name",
                schema_key.qualified()
            )));
        }

        let flow = self.flow_urn(schema_key);
        let urn = self.urns.data_job(&flow, &descriptor.name);
        Ok(vec![WorkUnit::new(
            format!("{urn}-dataJobInfo"),
            MetadataRecord::DataJob(DataJobRecord {
                urn,
                flow,
                name: descriptor.name.clone(),
                language: descriptor.language.clone(),
                argument_signature: descriptor.argument_signature.clone(),
                definition: descriptor.definition.clone(),
                comment: descriptor.comment.clone(),
                return_type: descriptor.return_type.clone(),
                created_at: descriptor.created_at,
                altered_at: descriptor.altered_at,
                properties: descriptor.extra_properties.clone().unwrap_or_default(),
            }),
        )])
    }
}
