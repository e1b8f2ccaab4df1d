//! Allow/deny name filtering.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Decides which catalog objects take part in a run.
///
/// Database and schema checks receive bare names. During reflection, table
/// and view checks receive the qualified `database.schema.name`, while the
/// dependency-graph resolver checks the bare view name. Procedure checks
/// receive the fully qualified `database.schema.procedure` name.
pub trait Matcher {
    fn database_allowed(&self, name: &str) -> bool;
    fn schema_allowed(&self, name: &str) -> bool;
    fn table_allowed(&self, name: &str) -> bool;
    fn view_allowed(&self, name: &str) -> bool;
    fn procedure_allowed(&self, qualified_name: &str) -> bool;
}

/// Regex allow and deny lists.
///
/// A name is allowed when no deny pattern matches and at least one allow
/// pattern matches. Patterns are anchored at the start of the name only, so
/// `sales` also admits `sales_archive`; add `$` for an exact match.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPattern", into = "RawPattern")]
pub struct AllowDenyPattern {
    allow: Vec<String>,
    deny: Vec<String>,
    ignore_case: bool,
    compiled_allow: Vec<Regex>,
    compiled_deny: Vec<Regex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawPattern {
    allow: Vec<String>,
    deny: Vec<String>,
    ignore_case: bool,
}

impl Default for RawPattern {
    fn default() -> Self {
        Self {
            allow: vec![".*".to_string()],
            deny: Vec::new(),
            ignore_case: true,
        }
    }
}

impl AllowDenyPattern {
    /// Build a pattern, compiling every regex up front.
    pub fn new(
        allow: Vec<String>,
        deny: Vec<String>,
        ignore_case: bool,
    ) -> Result<Self, regex::Error> {
        let compiled_allow = compile_all(&allow, ignore_case)?;
        let compiled_deny = compile_all(&deny, ignore_case)?;
        Ok(Self {
            allow,
            deny,
            ignore_case,
            compiled_allow,
            compiled_deny,
        })
    }

    /// A pattern that admits every name.
    pub fn allow_all() -> Self {
        Self::new(vec![".*".to_string()], Vec::new(), true).expect("'.*' is a valid regex")
    }

    /// Admit everything except names matching `deny`.
    pub fn deny(deny: &[&str]) -> Result<Self, regex::Error> {
        Self::new(
            vec![".*".to_string()],
            deny.iter().map(|s| s.to_string()).collect(),
            true,
        )
    }

    /// Admit only names matching `allow`.
    pub fn allow(allow: &[&str]) -> Result<Self, regex::Error> {
        Self::new(
            allow.iter().map(|s| s.to_string()).collect(),
            Vec::new(),
            true,
        )
    }

    pub fn allowed(&self, name: &str) -> bool {
        if self.compiled_deny.iter().any(|re| re.is_match(name)) {
            return false;
        }
        self.compiled_allow.iter().any(|re| re.is_match(name))
    }

    pub fn allow_patterns(&self) -> &[String] {
        &self.allow
    }

    pub fn deny_patterns(&self) -> &[String] {
        &self.deny
    }
}

fn compile_all(patterns: &[String], ignore_case: bool) -> Result<Vec<Regex>, regex::Error> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(&format!("^(?:{pattern})"))
                .case_insensitive(ignore_case)
                .build()
        })
        .collect()
}

impl Default for AllowDenyPattern {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl fmt::Debug for AllowDenyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllowDenyPattern")
            .field("allow", &self.allow)
            .field("deny", &self.deny)
            .field("ignore_case", &self.ignore_case)
            .finish()
    }
}

impl PartialEq for AllowDenyPattern {
    fn eq(&self, other: &Self) -> bool {
        self.allow == other.allow && self.deny == other.deny && self.ignore_case == other.ignore_case
    }
}

impl TryFrom<RawPattern> for AllowDenyPattern {
    type Error = regex::Error;

    fn try_from(raw: RawPattern) -> Result<Self, Self::Error> {
        Self::new(raw.allow, raw.deny, raw.ignore_case)
    }
}

impl From<AllowDenyPattern> for RawPattern {
    fn from(pattern: AllowDenyPattern) -> Self {
        Self {
            allow: pattern.allow,
            deny: pattern.deny,
            ignore_case: pattern.ignore_case,
        }
    }
}
