//! TOML configuration for an extraction run.
//!
//! Every key is optional. `${VAR}` and `$VAR` references are expanded from the
//! environment before the file is parsed, so secrets can stay out of the file.
//! Full-line `#` comments are left as written:
//!
//! ```toml
//! host_port = "db.internal:5432"
//! username = "catalog_reader"
//! password = "${PGSCOPE_PASSWORD}"
//! initial_database = "postgres"
//!
//! include_stored_procedures = true
//! view_lineage_gate = "skip_resolved"
//!
//! [database_pattern]
//! deny = ["scratch_.*"]
//!
//! [procedure_pattern]
//! allow = ["sales\\.public\\..*"]
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::lineage::LineageGate;
use crate::pattern::{AllowDenyPattern, Matcher};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Settings for one extraction run against a PostgreSQL server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// `host:port` of the server. Ignored when `connection_uri` is set.
    pub host_port: String,
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Full connection URI. Takes precedence over the individual settings and,
    /// like `database`, restricts the run to the single database it names.
    pub connection_uri: Option<String>,

    /// Restrict the run to this database and use its name verbatim in every
    /// fully qualified identifier.
    pub database: Option<String>,

    /// Database used to list the server's databases when `database` and
    /// `connection_uri` are both unset.
    pub initial_database: Option<String>,

    /// Ignored when `database` or `connection_uri` is set.
    pub database_pattern: AllowDenyPattern,
    pub schema_pattern: AllowDenyPattern,
    pub table_pattern: AllowDenyPattern,
    pub view_pattern: AllowDenyPattern,
    /// Matched against `database.schema.procedure`.
    pub procedure_pattern: AllowDenyPattern,

    pub include_tables: bool,
    pub include_views: bool,
    pub include_stored_procedures: bool,
    pub include_view_lineage: bool,
    pub view_lineage_gate: LineageGate,

    /// Collect `pg_table_size` for every table before reflecting a database.
    pub profile_table_sizes: bool,

    pub platform_instance: Option<String>,
    pub env: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host_port: "localhost:5432".to_string(),
            username: None,
            password: None,
            connection_uri: None,
            database: None,
            initial_database: Some("postgres".to_string()),
            database_pattern: AllowDenyPattern::allow_all(),
            schema_pattern: AllowDenyPattern::deny(&["information_schema"])
                .expect("static pattern is valid"),
            table_pattern: AllowDenyPattern::allow_all(),
            view_pattern: AllowDenyPattern::allow_all(),
            procedure_pattern: AllowDenyPattern::allow_all(),
            include_tables: true,
            include_views: true,
            include_stored_procedures: true,
            include_view_lineage: true,
            view_lineage_gate: LineageGate::default(),
            profile_table_sizes: false,
            platform_instance: None,
            env: "PROD".to_string(),
        }
    }
}

impl PostgresConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text after environment expansion.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let expanded = content
            .lines()
            .map(|line| {
                if line.trim_start().starts_with('#') {
                    Ok(line.to_string())
                } else {
                    expand_env_vars(line)
                }
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        Ok(toml::from_str(&expanded)?)
    }

    /// Render the configuration as TOML. The password is never included.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let mut redacted = self.clone();
        redacted.password = None;
        Ok(toml::to_string_pretty(&redacted)?)
    }

    /// True when the run targets exactly one database.
    pub fn is_single_database(&self) -> bool {
        self.database.is_some() || self.connection_uri.is_some()
    }

    /// Database for the first connection: the configured one, or the
    /// bootstrap database used for enumeration.
    pub fn bootstrap_database(&self) -> Option<&str> {
        self.database.as_deref().or(self.initial_database.as_deref())
    }

    /// Split `host_port` into host and an optional port.
    pub fn host_and_port(&self) -> (&str, Option<u16>) {
        match self.host_port.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => (host, Some(port)),
                Err(_) => (self.host_port.as_str(), None),
            },
            None => (self.host_port.as_str(), None),
        }
    }
}

impl Matcher for PostgresConfig {
    fn database_allowed(&self, name: &str) -> bool {
        self.database_pattern.allowed(name)
    }

    fn schema_allowed(&self, name: &str) -> bool {
        self.schema_pattern.allowed(name)
    }

    fn table_allowed(&self, name: &str) -> bool {
        self.table_pattern.allowed(name)
    }

    fn view_allowed(&self, name: &str) -> bool {
        self.view_pattern.allowed(name)
    }

    fn procedure_allowed(&self, qualified_name: &str) -> bool {
        self.procedure_pattern.allowed(qualified_name)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. `$$` produces a literal `$`.
pub fn expand_env_vars(s: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('$') => {
                chars.next();
                result.push('$');
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    result.push_str("${");
                    result.push_str(&name);
                    continue;
                }
                result.push_str(&lookup(&name)?);
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                result.push_str(&lookup(&name)?);
            }
            _ => result.push('$'),
        }
    }

    Ok(result)
}

fn lookup(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}
