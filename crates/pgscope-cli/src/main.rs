//! pgscope CLI - PostgreSQL lineage and stored procedure extraction

use pgscope_cli::catalog::SqlxConnectionFactory;
use pgscope_cli::cli::{Args, OutputFormat};
use pgscope_cli::{logging, output, settings};

use anyhow::{Context, Result};
use clap::Parser;
use pgscope_core::{PostgresSource, SourceReport, WorkUnit};
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

/// The run completed but recorded failures.
const EXIT_FAILURE: u8 = 1;
/// Bad configuration, or a fatal error that aborted the run.
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(has_failures) => {
            if has_failures {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("pgscope: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run(args: Args) -> Result<bool> {
    logging::init(args.log_level, args.json_logs)?;

    let config = settings::load_config(&args)?;
    if args.print_config {
        let rendered = config
            .to_toml_string()
            .context("Failed to render configuration")?;
        write_output(&args.output, &rendered)?;
        return Ok(false);
    }

    let started_at = Instant::now();
    let factory = SqlxConnectionFactory::new(&config).context("Failed to set up connections")?;
    let mut source = PostgresSource::new(config, factory);

    let units = source
        .workunits()
        .collect::<Result<Vec<WorkUnit>, _>>()
        .context("Extraction aborted")?;
    let report = source.into_report();
    info!(
        workunits = units.len(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "extraction finished"
    );

    let output_str = match args.format {
        OutputFormat::Json => {
            output::format_json(&units, &report, args.compact).context("Failed to encode JSON")?
        }
        OutputFormat::Jsonl => output::format_jsonl(&units).context("Failed to encode JSON")?,
        OutputFormat::Summary => {
            output::format_summary(&units, &report, args.quiet, args.output.is_none())
        }
    };
    write_output(&args.output, &output_str)?;

    if args.format != OutputFormat::Summary {
        print_issues(&report, args.quiet);
    }

    Ok(report.has_failures())
}

/// Warnings and failures go to stderr so machine-readable output stays clean.
fn print_issues(report: &SourceReport, quiet: bool) {
    let warnings = if quiet { &[][..] } else { &report.warnings[..] };
    for entry in warnings.iter().chain(&report.failures) {
        eprintln!(
            "pgscope: {:?}: [{}] {}: {}",
            entry.severity, entry.context, entry.title, entry.message
        );
    }
}

fn write_output(path: &Option<std::path::PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        io::stdout()
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure newline at end for terminal output
        if !content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
