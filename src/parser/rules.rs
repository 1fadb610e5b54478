// src/parser/rules.rs
// Table-driven field extraction: each metadata-sourced field is one rule
// naming the Meta key it reads and the fallback used when the document
// leaves it out. Adding a field or changing a default is a table edit.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use tracing::warn;

use super::meta::MetaMap;
use crate::utils::parse_timestamp;

#[derive(Debug, Clone, Copy)]
pub struct MetaField {
    pub key: &'static str,
    pub default: Option<&'static str>,
}

impl MetaField {
    pub const fn with_default(key: &'static str, default: &'static str) -> Self {
        Self {
            key,
            default: Some(default),
        }
    }

    pub const fn optional(key: &'static str) -> Self {
        Self { key, default: None }
    }

    /// The document's value for this field, or the rule's fallback.
    pub fn resolve(&self, meta: &MetaMap) -> Option<String> {
        meta.get(self.key)
            .cloned()
            .or_else(|| self.default.map(str::to_string))
    }

    /// Resolve into a closed enumeration. A value outside the enumeration is
    /// rejected at this boundary and replaced by `fallback` with a warning.
    pub fn resolve_parsed<T: FromStr>(&self, meta: &MetaMap, fallback: T) -> T {
        match self.resolve(meta) {
            Some(raw) => match raw.parse::<T>() {
                Ok(value) => value,
                Err(_) => {
                    warn!("Unrecognized {} value '{}', using default", self.key, raw);
                    fallback
                }
            },
            None => fallback,
        }
    }

    /// Resolve into a timestamp, falling back when absent or unparseable.
    pub fn resolve_timestamp(&self, meta: &MetaMap, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.resolve(meta)
            .and_then(|raw| parse_timestamp(&raw))
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Priority;

    fn meta(pairs: &[(&str, &str)]) -> MetaMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_prefers_document_value() {
        let rule = MetaField::with_default("owner", "Unassigned");
        assert_eq!(
            rule.resolve(&meta(&[("owner", "ana")])).as_deref(),
            Some("ana")
        );
        assert_eq!(rule.resolve(&meta(&[])).as_deref(), Some("Unassigned"));
    }

    #[test]
    fn test_optional_rule_has_no_fallback() {
        let rule = MetaField::optional("dependsOn");
        assert!(rule.resolve(&meta(&[])).is_none());
    }

    #[test]
    fn test_out_of_enumeration_value_falls_back() {
        let rule = MetaField::with_default("priority", "P2");
        let parsed: Priority = rule.resolve_parsed(&meta(&[("priority", "urgent")]), Priority::P2);
        assert_eq!(parsed, Priority::P2);

        let parsed: Priority = rule.resolve_parsed(&meta(&[("priority", "P0")]), Priority::P2);
        assert_eq!(parsed, Priority::P0);
    }
}
