//! Run report: drops, warnings, failures and counters.

use std::error::Error;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::types::{MetadataRecord, Severity, StructuredLogEntry, WorkUnit};

/// Sink for non-fatal events. Reporting never fails and never interrupts the caller.
pub trait Reporter {
    /// An entity was filtered out by a pattern.
    fn report_dropped(&mut self, identifier: &str);

    fn report_warning(
        &mut self,
        title: &str,
        message: &str,
        context: &str,
        cause: Option<&dyn Error>,
    );

    fn report_failure(
        &mut self,
        title: &str,
        message: &str,
        context: &str,
        cause: Option<&dyn Error>,
    );
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    /// Filtered identifiers in the order they were first dropped. Each
    /// identifier appears once per run.
    pub dropped: Vec<String>,
    pub warnings: Vec<StructuredLogEntry>,
    pub failures: Vec<StructuredLogEntry>,

    pub databases_scanned: usize,
    pub schemas_scanned: usize,
    pub tables_scanned: usize,
    pub views_scanned: usize,
    pub procedures_scanned: usize,
    pub lineage_records: usize,
    pub workunits_produced: usize,
}

impl SourceReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Occurrences of `identifier` in the dropped list, at most one.
    pub fn dropped_count(&self, identifier: &str) -> usize {
        self.dropped.iter().filter(|d| d.as_str() == identifier).count()
    }

    /// Account for a workunit handed to the caller.
    pub fn record_workunit(&mut self, unit: &WorkUnit) {
        self.workunits_produced += 1;
        match &unit.record {
            MetadataRecord::Dataset(dataset) if dataset.sub_type.is_view() => {
                self.views_scanned += 1
            }
            MetadataRecord::Dataset(_) => self.tables_scanned += 1,
            MetadataRecord::UpstreamLineage(_) => self.lineage_records += 1,
            _ => {}
        }
    }

    fn entry(
        severity: Severity,
        title: &str,
        message: &str,
        context: &str,
        cause: Option<&dyn Error>,
    ) -> StructuredLogEntry {
        StructuredLogEntry {
            severity,
            title: title.to_string(),
            message: message.to_string(),
            context: context.to_string(),
            cause: cause.map(|e| e.to_string()),
        }
    }
}

impl Reporter for SourceReport {
    fn report_dropped(&mut self, identifier: &str) {
        if self.dropped.iter().any(|d| d == identifier) {
            return;
        }
        debug!(identifier, "dropped by pattern");
        self.dropped.push(identifier.to_string());
    }

    fn report_warning(
        &mut self,
        title: &str,
        message: &str,
        context: &str,
        cause: Option<&dyn Error>,
    ) {
        let entry = Self::entry(Severity::Warning, title, message, context, cause);
        warn!(
            title = %entry.title,
            context = %entry.context,
            cause = entry.cause.as_deref().unwrap_or(""),
            "{}",
            entry.message
        );
        self.warnings.push(entry);
    }

    fn report_failure(
        &mut self,
        title: &str,
        message: &str,
        context: &str,
        cause: Option<&dyn Error>,
    ) {
        let entry = Self::entry(Severity::Failure, title, message, context, cause);
        error!(
            title = %entry.title,
            context = %entry.context,
            cause = entry.cause.as_deref().unwrap_or(""),
            "{}",
            entry.message
        );
        self.failures.push(entry);
    }
}
