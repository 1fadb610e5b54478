// src/parser/project.rs
// Parses a project directory's overview document. A missing overview is not
// an error - the caller skips that project and keeps scanning.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use super::meta::extract_meta;
use super::rules::MetaField;
use super::section_body;
use crate::records::{Priority, Project, ProjectStatus};
use crate::utils::{file_mtime, humanize_slug};

pub const OVERVIEW_FILENAME: &str = "overview.md";
pub const PROJECT_DIR_PREFIX: &str = "project-";

const OBJECTIVE_FALLBACK: &str = "No objective recorded";

static TITLE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#[ \t]+[^:\n]+:[ \t]*(.+?)[ \t]*$").unwrap());
static OBJECTIVE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-[ \t]*Objective:[ \t]*(.+?)[ \t]*$").unwrap());
static METRICS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-[ \t]*Success metrics:").unwrap());
static SUB_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]+-[ \t]+(.+?)[ \t]*$").unwrap());
static TOP_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-[ \t]").unwrap());

const STATUS: MetaField = MetaField::with_default("status", "active");
const PRIORITY: MetaField = MetaField::with_default("priority", "P2");
const STAKEHOLDER: MetaField = MetaField::optional("stakeholder");
const PLANNER: MetaField = MetaField::optional("planner");
const TARGET_DATE: MetaField = MetaField::optional("targetDate");
const LAST_UPDATED: MetaField = MetaField::optional("lastUpdated");

/// Parse `<dir>/overview.md` into a Project record. Returns None when the
/// directory carries no overview.
pub fn parse_project(dir: &Path) -> Option<Project> {
    let overview = dir.join(OVERVIEW_FILENAME);
    let text = match std::fs::read_to_string(&overview) {
        Ok(text) => text,
        Err(_) => {
            debug!("No overview in {}, skipping project", dir.display());
            return None;
        }
    };

    let dir_name = dir.file_name()?.to_string_lossy().to_string();
    let slug = dir_name
        .strip_prefix(PROJECT_DIR_PREFIX)
        .unwrap_or(&dir_name)
        .to_string();

    let title = TITLE_HEADING
        .captures(&text)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| humanize_slug(&slug));

    let snapshot = section_body(&text, "Snapshot");
    let objective = snapshot
        .as_deref()
        .and_then(|body| OBJECTIVE_LINE.captures(body))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| OBJECTIVE_FALLBACK.to_string());
    let success_metrics = snapshot
        .as_deref()
        .map(success_metrics)
        .unwrap_or_default();

    let meta = extract_meta(&text);
    let mtime_fallback = file_mtime(&overview).unwrap_or_else(chrono::Utc::now);

    Some(Project {
        title,
        objective,
        success_metrics,
        status: STATUS.resolve_parsed(&meta, ProjectStatus::Active),
        priority: PRIORITY.resolve_parsed(&meta, Priority::P2),
        stakeholder: STAKEHOLDER.resolve(&meta),
        planner: PLANNER.resolve(&meta),
        target_date: TARGET_DATE.resolve(&meta),
        last_updated: LAST_UPDATED.resolve_timestamp(&meta, mtime_fallback),
        path: overview.display().to_string(),
        slug,
    })
}

/// Every sub-bullet after the `- Success metrics:` marker, up to the next
/// top-level bullet.
fn success_metrics(snapshot: &str) -> Vec<String> {
    let mut metrics = Vec::new();
    let mut in_metrics = false;

    for line in snapshot.lines() {
        if METRICS_MARKER.is_match(line) {
            in_metrics = true;
            continue;
        }
        if !in_metrics {
            continue;
        }
        if let Some(caps) = SUB_BULLET.captures(line) {
            metrics.push(caps[1].to_string());
        } else if TOP_BULLET.is_match(line) {
            break;
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_dir(name: &str, overview: Option<&str>) -> (TempDir, std::path::PathBuf) {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(text) = overview {
            fs::write(dir.join(OVERVIEW_FILENAME), text).unwrap();
        }
        (root, dir)
    }

    const OVERVIEW: &str = "\
# PROJ: Checkout Revamp

## Snapshot
- Objective: Cut checkout time in half
- Success metrics:
  - p95 checkout under 3s
  - Cart abandonment below 20%
- Team: payments

## Meta
- Status: paused
- Priority: P1
- Stakeholder: Dana
- Target Date: 2025-06-30
- Last Updated: 2025-03-01
";

    #[test]
    fn test_full_overview() {
        let (_root, dir) = project_dir("project-checkout", Some(OVERVIEW));
        let project = parse_project(&dir).unwrap();

        assert_eq!(project.slug, "checkout");
        assert_eq!(project.title, "Checkout Revamp");
        assert_eq!(project.objective, "Cut checkout time in half");
        assert_eq!(
            project.success_metrics,
            vec!["p95 checkout under 3s", "Cart abandonment below 20%"]
        );
        assert_eq!(project.status, ProjectStatus::Paused);
        assert_eq!(project.priority, Priority::P1);
        assert_eq!(project.stakeholder.as_deref(), Some("Dana"));
        assert!(project.planner.is_none());
        assert_eq!(project.target_date.as_deref(), Some("2025-06-30"));
    }

    #[test]
    fn test_missing_overview_is_skipped() {
        let (_root, dir) = project_dir("project-ghost", None);
        assert!(parse_project(&dir).is_none());
    }

    #[test]
    fn test_fallbacks_for_bare_document() {
        let (_root, dir) = project_dir("project-customer-portal", Some("Some notes.\n"));
        let project = parse_project(&dir).unwrap();

        assert_eq!(project.title, "Customer Portal");
        assert_eq!(project.objective, OBJECTIVE_FALLBACK);
        assert!(project.success_metrics.is_empty());
        assert_eq!(project.status, ProjectStatus::Active);
        assert_eq!(project.priority, Priority::P2);
    }

    #[test]
    fn test_metrics_stop_at_next_top_level_bullet() {
        let doc = "\
# P: Alpha

## Snapshot
- Success metrics:
  - first
  - second
- Objective: Later bullet
  - not a metric
";
        let (_root, dir) = project_dir("project-alpha", Some(doc));
        let project = parse_project(&dir).unwrap();
        assert_eq!(project.success_metrics, vec!["first", "second"]);
        assert_eq!(project.objective, "Later bullet");
    }
}
