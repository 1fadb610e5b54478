// src/parser/meta.rs
// Pulls the flat key/value mapping out of a document's `## Meta` block.
// Keys are normalized to camelCase so downstream field lookups are stable
// regardless of how the author spelled them.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::section_body;

pub type MetaMap = HashMap<String, String>;

static META_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-\s*([^:]+):\s*(.*)$").unwrap());

/// Extract the `## Meta` section into a normalized map. No section means an
/// empty map, not an error. Lines without a colon are skipped. A duplicate
/// key keeps its last occurrence; a `-` or empty value marks the key absent.
pub fn extract_meta(text: &str) -> MetaMap {
    let mut map = MetaMap::new();

    let Some(body) = section_body(text, "Meta") else {
        return map;
    };

    for line in body.lines() {
        let Some(caps) = META_LINE.captures(line.trim()) else {
            continue;
        };

        let key = normalize_key(&caps[1]);
        if key.is_empty() {
            continue;
        }

        let value = caps[2].trim();
        if value.is_empty() || value == "-" {
            // Explicitly-absent value: the key contributes no entry, and a
            // later absent occurrence clears an earlier concrete one.
            map.remove(&key);
        } else {
            map.insert(key, value.to_string());
        }
    }

    map
}

/// Lowercase the key, then collapse each separator run into camelCase:
/// `Target Date` -> `targetDate`, `depends_on` -> `dependsOn`.
pub fn normalize_key(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut upper_next = false;

    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next && !out.is_empty() {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }

    out
}
