//! JSON output formatting.

use pgscope_core::{SourceReport, WorkUnit};
use serde::Serialize;

/// Everything one run produced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunDocument<'a> {
    workunits: &'a [WorkUnit],
    report: &'a SourceReport,
}

/// Format workunits and the report as one JSON document.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_json(
    units: &[WorkUnit],
    report: &SourceReport,
    compact: bool,
) -> serde_json::Result<String> {
    let document = RunDocument {
        workunits: units,
        report,
    };
    if compact {
        serde_json::to_string(&document)
    } else {
        serde_json::to_string_pretty(&document)
    }
}

/// One compact workunit per line. The report is not included.
pub fn format_jsonl(units: &[WorkUnit]) -> serde_json::Result<String> {
    let lines = units
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}
