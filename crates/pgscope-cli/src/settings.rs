//! Effective configuration: the config file with command-line overrides applied.

use anyhow::{Context, Result};
use pgscope_core::{LineageGate, PostgresConfig};

use crate::cli::Args;

/// Load the config file named by `--config`, or the defaults, and apply flags.
pub fn load_config(args: &Args) -> Result<PostgresConfig> {
    let mut config = match &args.config {
        Some(path) => PostgresConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PostgresConfig::default(),
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

/// Flags win over file values. Switches only ever turn features off or on
/// relative to the file; an absent flag leaves the file value alone.
pub fn apply_overrides(config: &mut PostgresConfig, args: &Args) {
    if let Some(uri) = &args.uri {
        config.connection_uri = Some(uri.clone());
    }
    if let Some(host_port) = &args.host_port {
        config.host_port = host_port.clone();
    }
    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        config.password = Some(password.clone());
    }
    if let Some(database) = &args.database {
        config.database = Some(database.clone());
    }
    if args.no_procedures {
        config.include_stored_procedures = false;
    }
    if args.no_view_lineage {
        config.include_view_lineage = false;
    }
    if args.stop_lineage_at_first_resolved {
        config.view_lineage_gate = LineageGate::StopAtFirstResolved;
    }
    if args.profile_table_sizes {
        config.profile_table_sizes = true;
    }
}
