//! Secondary index definitions and exact-match TAG queries

use std::fmt;

/// A RediSearch index over hashes sharing a key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    /// Key prefix of the indexed hashes
    pub prefix: &'static str,
    /// Fields declared as TAG in the schema
    pub tag_fields: &'static [&'static str],
}

/// TAG separator of every indexed field. Identifiers never contain it, so a
/// value is indexed as one tag even when it has commas.
pub const TAG_SEPARATOR: &str = "\u{1f}";

impl IndexDefinition {
    /// `SCHEMA` arguments of `FT.CREATE`.
    ///
    /// Tags are case-sensitive: subscriber ids differing only in case are
    /// different subscribers.
    pub fn schema_args(&self) -> Vec<&'static str> {
        self.tag_fields
            .iter()
            .flat_map(|field| [*field, "TAG", "SEPARATOR", TAG_SEPARATOR, "CASESENSITIVE"])
            .collect()
    }
}

/// NAS directory, searched by exact IP
pub const NAS_INDEX: IndexDefinition = IndexDefinition {
    name: "index_nas",
    prefix: "radius_nas:",
    tag_fields: &["ip_address"],
};

/// Subscriber sessions, searched by IP, session id or subscriber id
pub const SUBSCRIBER_INDEX: IndexDefinition = IndexDefinition {
    name: "index_subs",
    prefix: "subscriber:",
    tag_fields: &["ip", "session_id", "subscriber_id"],
};

/// Exact match of one TAG field against a raw value.
///
/// The raw value is kept as-is for in-memory matching; `Display` renders the
/// escaped `@field:{value}` form understood by `FT.SEARCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub field: &'static str,
    pub value: String,
}

impl TagQuery {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &super::FieldMap) -> bool {
        fields.get(self.field).map(String::as_str) == Some(self.value.as_str())
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{{{}}}", self.field, escape_tag_value(&self.value))
    }
}

/// Backslash-escape every character that is not alphanumeric or `_`.
///
/// TAG values containing punctuation (`.` and `:` in IPs, `-` in MACs) or
/// spaces would otherwise be tokenized by the query parser.
pub fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() * 2);
    for c in value.chars() {
        if !c.is_alphanumeric() && c != '_' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
