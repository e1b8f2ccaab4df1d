//! Human-readable run summary with optional colors.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use pgscope_core::{MetadataRecord, SourceReport, StructuredLogEntry, WorkUnit};
use std::fmt::{self, Write};

/// Format the run as text. `quiet` hides warnings; failures are always listed.
pub fn format_summary(
    units: &[WorkUnit],
    report: &SourceReport,
    quiet: bool,
    use_colors: bool,
) -> String {
    let colored = use_colors && std::io::stdout().is_terminal();
    let mut out = String::new();
    // Writing into a String never fails.
    let _ = write_summary(&mut out, units, report, quiet, colored);
    out
}

fn write_summary(
    out: &mut String,
    units: &[WorkUnit],
    report: &SourceReport,
    quiet: bool,
    colored: bool,
) -> fmt::Result {
    write_header(out, colored)?;
    write_counters(out, report, colored)?;
    write_lineage(out, units)?;

    if !quiet {
        write_entries(out, "Warnings", &report.warnings, colored)?;
    }
    write_entries(out, "Failures", &report.failures, colored)
}

fn write_header(out: &mut String, colored: bool) -> fmt::Result {
    let title = "pgscope extraction";
    let line = "═".repeat(50);

    if colored {
        writeln!(out, "{}", title.bold())?;
        writeln!(out, "{}", line.dimmed())?;
    } else {
        writeln!(out, "{title}")?;
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn write_counters(out: &mut String, report: &SourceReport, colored: bool) -> fmt::Result {
    let stats = format!(
        "Summary: {} databases | {} schemas | {} tables | {} views | {} procedures",
        report.databases_scanned,
        report.schemas_scanned,
        report.tables_scanned,
        report.views_scanned,
        report.procedures_scanned,
    );
    let totals = format!(
        "{} lineage records | {} workunits | {} dropped",
        report.lineage_records,
        report.workunits_produced,
        report.dropped.len(),
    );

    if colored {
        writeln!(out, "{}", stats.cyan())?;
    } else {
        writeln!(out, "{stats}")?;
    }
    writeln!(out, "{totals}")?;
    writeln!(out)
}

fn write_lineage(out: &mut String, units: &[WorkUnit]) -> fmt::Result {
    let records: Vec<_> = units
        .iter()
        .filter_map(|unit| match &unit.record {
            MetadataRecord::UpstreamLineage(lineage) => Some(lineage),
            _ => None,
        })
        .collect();
    if records.is_empty() {
        return Ok(());
    }

    writeln!(out, "View lineage:")?;
    for record in records {
        writeln!(out, "  {}", record.dataset)?;
        for upstream in &record.upstreams {
            writeln!(out, "    <- {upstream}")?;
        }
    }
    writeln!(out)
}

fn write_entries(
    out: &mut String,
    heading: &str,
    entries: &[StructuredLogEntry],
    colored: bool,
) -> fmt::Result {
    if entries.is_empty() {
        return Ok(());
    }

    let heading = format!("{heading} ({}):", entries.len());
    if colored {
        writeln!(out, "{}", heading.yellow())?;
    } else {
        writeln!(out, "{heading}")?;
    }

    for entry in entries {
        writeln!(out, "  [{}] {}: {}", entry.context, entry.title, entry.message)?;
        if let Some(cause) = &entry.cause {
            writeln!(out, "      caused by: {cause}")?;
        }
    }
    writeln!(out)
}
