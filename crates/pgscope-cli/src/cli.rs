//! CLI argument parsing using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// pgscope - PostgreSQL lineage and stored procedure extraction
#[derive(Parser, Debug)]
#[command(name = "pgscope")]
#[command(
    about = "Extract view lineage and stored procedures from PostgreSQL catalogs",
    long_about = None
)]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(short = 'C', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Full connection URI (e.g., postgres://user@host:5432/db); targets that single database
    #[arg(long, value_name = "URL")]
    pub uri: Option<String>,

    /// Server address as host:port
    #[arg(long, value_name = "HOST:PORT")]
    pub host_port: Option<String>,

    /// User to connect as
    #[arg(short = 'U', long)]
    pub username: Option<String>,

    /// Password for the connection
    #[arg(long, env = "PGSCOPE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Extract a single database instead of enumerating the server
    #[arg(short, long, value_name = "NAME")]
    pub database: Option<String>,

    /// Skip stored procedure discovery
    #[arg(long)]
    pub no_procedures: bool,

    /// Skip dependency-graph view lineage
    #[arg(long)]
    pub no_view_lineage: bool,

    /// Stop a database's fallback lineage at the first view already resolved from SQL
    #[arg(long)]
    pub stop_lineage_at_first_resolved: bool,

    /// Attach on-disk table sizes to dataset records
    #[arg(long)]
    pub profile_table_sizes: bool,

    /// Output format
    #[arg(short, long, default_value = "json", value_enum)]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,

    /// Suppress warnings on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Emit log lines as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Workunits and report as one JSON document
    Json,
    /// One workunit per line
    Jsonl,
    /// Human-readable run summary
    Summary,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}
