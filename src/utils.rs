// src/utils.rs
// Small shared helpers: timestamp parsing and slug formatting.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::path::Path;

// ============================================================================
// Timestamp utilities
// ============================================================================

/// Parse a human-authored timestamp from a document. Accepts RFC 3339,
/// `YYYY-MM-DD HH:MM`, and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }

    None
}

/// Filesystem modification time of a path, if the metadata is readable.
pub fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

// ============================================================================
// Slug formatting
// ============================================================================

/// Turn a directory slug into a displayable title: separators become spaces
/// and each word is capitalized. `customer-portal` -> `Customer Portal`.
pub fn humanize_slug(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Walk a path's components for the owning `project-<slug>` directory and
/// return the slug. Works for both the flat and per-task outputs layouts.
pub fn project_slug_from_path(path: &Path) -> Option<String> {
    path.components().rev().find_map(|component| {
        let name = component.as_os_str().to_string_lossy();
        name.strip_prefix("project-").map(|slug| slug.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2025-01-01").is_some());
        assert!(parse_timestamp("2025-01-01 14:30").is_some());
        assert!(parse_timestamp("2025-01-01T14:30:00Z").is_some());
        assert!(parse_timestamp("January 1st").is_none());
    }

    #[test]
    fn test_humanize_slug() {
        assert_eq!(humanize_slug("customer-portal"), "Customer Portal");
        assert_eq!(humanize_slug("q3_launch"), "Q3 Launch");
        assert_eq!(humanize_slug("alpha"), "Alpha");
    }

    #[test]
    fn test_project_slug_from_path() {
        let path = PathBuf::from("workspace/project-alpha/outputs/T-003/report.md");
        assert_eq!(project_slug_from_path(&path).as_deref(), Some("alpha"));

        let path = PathBuf::from("workspace/notes/report.md");
        assert_eq!(project_slug_from_path(&path), None);
    }
}
