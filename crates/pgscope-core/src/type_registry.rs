//! Mapping from PostgreSQL column types to [`FieldType`].

use std::collections::HashMap;

use crate::types::FieldType;

/// Read-only lookup from a native type name to a [`FieldType`].
///
/// Built once per run and shared by reference. Lookups ignore case, type
/// modifiers such as `(40)` and array suffixes are handled before the map is
/// consulted, and unknown types map to [`FieldType::Null`].
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<&'static str, FieldType>,
}

impl TypeRegistry {
    /// Builtin PostgreSQL types plus the extension types the catalog knows about.
    pub fn postgres() -> Self {
        use FieldType::*;

        let entries: &[(&'static str, FieldType)] = &[
            ("boolean", Boolean),
            ("bool", Boolean),
            ("smallint", Number),
            ("integer", Number),
            ("bigint", Number),
            ("int2", Number),
            ("int4", Number),
            ("int8", Number),
            ("real", Number),
            ("double precision", Number),
            ("float4", Number),
            ("float8", Number),
            ("numeric", Number),
            ("decimal", Number),
            ("money", Number),
            ("oid", Number),
            ("text", String),
            ("character varying", String),
            ("varchar", String),
            ("character", String),
            ("char", String),
            ("bpchar", String),
            ("name", String),
            ("citext", String),
            ("uuid", String),
            ("inet", String),
            ("cidr", String),
            ("macaddr", String),
            ("xml", String),
            ("interval", String),
            ("tsvector", String),
            ("bytea", Bytes),
            ("json", Bytes),
            ("jsonb", Bytes),
            ("geometry", Bytes),
            ("geography", Bytes),
            ("hstore", Map),
            ("date", Date),
            ("timestamp", Time),
            ("timestamp without time zone", Time),
            ("timestamp with time zone", Time),
            ("timestamptz", Time),
            ("time", Time),
            ("time without time zone", Time),
            ("time with time zone", Time),
            ("timetz", Time),
            ("array", Array),
            ("record", Record),
        ];

        Self {
            types: entries.iter().copied().collect(),
        }
    }

    /// Resolve a type as printed by `format_type`.
    pub fn resolve(&self, native_type: &str) -> FieldType {
        let normalized = normalize(native_type);
        if normalized.ends_with("[]") || normalized.starts_with('_') {
            return FieldType::Array;
        }
        self.types
            .get(normalized.as_str())
            .copied()
            .unwrap_or(FieldType::Null)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::postgres()
    }
}

/// Lowercase, drop type modifiers and any schema qualifier.
fn normalize(native_type: &str) -> String {
    let lowered = native_type.trim().to_lowercase();
    let without_modifiers = match (lowered.find('('), lowered.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            format!("{}{}", &lowered[..open], &lowered[close + 1..])
        }
        _ => lowered,
    };
    let unqualified = match without_modifiers.rsplit_once('.') {
        Some((_, name)) => name.to_string(),
        None => without_modifiers,
    };
    unqualified.split_whitespace().collect::<Vec<_>>().join(" ")
}
