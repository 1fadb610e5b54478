// src/parser/task.rs
// Parses one task file. The `# T-nnn: Title` heading is the task's identity;
// without it the file cannot be attributed and is dropped with a warning.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::warn;

use super::meta::extract_meta;
use super::rules::MetaField;
use super::{first_heading, section_body};
use crate::records::{Priority, Task, TaskStatus};
use crate::utils::project_slug_from_path;

static TASK_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[ \t]+(T-\d+):[ \t]+(.+?)[ \t]*$").unwrap());
static CHECKLIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-[ \t]*\[[ xX]\][ \t]*(.+?)[ \t]*$").unwrap());

const OWNER: MetaField = MetaField::with_default("owner", "Unassigned");
const STATUS: MetaField = MetaField::with_default("status", "todo");
const PRIORITY: MetaField = MetaField::with_default("priority", "P2");
const DEPENDS_ON: MetaField = MetaField::optional("dependsOn");
const CREATED: MetaField = MetaField::optional("created");
const UPDATED: MetaField = MetaField::optional("updated");
const OUTPUTS: MetaField = MetaField::optional("outputs");

/// Parse a task file into a Task record. Returns None (with a warning) when
/// the heading does not match the required pattern, so a malformed file
/// never aborts the surrounding scan.
pub fn parse_task(path: &Path) -> Option<Task> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("Could not read task file {}: {}", path.display(), err);
            return None;
        }
    };

    let Some(caps) = first_heading(&text).and_then(|line| TASK_HEADING.captures(line)) else {
        warn!("Task file {} has no T-nnn heading, skipping", path.display());
        return None;
    };
    let id = caps[1].to_string();
    let title = caps[2].to_string();

    let Some(project) = project_slug_from_path(path) else {
        warn!(
            "Task file {} is not inside a project directory, skipping",
            path.display()
        );
        return None;
    };

    let goal = section_body(&text, "Goal")
        .map(|body| body.trim().to_string())
        .filter(|body| !body.is_empty());

    let acceptance_criteria = section_body(&text, "Acceptance Criteria")
        .map(|body| {
            body.lines()
                .filter_map(|line| CHECKLIST_ITEM.captures(line.trim()))
                .map(|caps| caps[1].to_string())
                .collect()
        })
        .unwrap_or_default();

    let meta = extract_meta(&text);
    let now = Utc::now();

    let outputs = OUTPUTS.resolve(&meta).map(|raw| {
        raw.split(',')
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect()
    });

    Some(Task {
        id,
        project,
        title,
        owner: OWNER.resolve(&meta).unwrap_or_default(),
        status: STATUS.resolve_parsed(&meta, TaskStatus::Todo),
        priority: PRIORITY.resolve_parsed(&meta, Priority::P2),
        depends_on: DEPENDS_ON.resolve(&meta),
        created: CREATED.resolve_timestamp(&meta, now),
        updated: UPDATED.resolve_timestamp(&meta, now),
        goal,
        acceptance_criteria,
        outputs,
        path: path.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_task(doc: &str) -> (TempDir, std::path::PathBuf) {
        let root = TempDir::new().unwrap();
        let tasks = root.path().join("project-alpha").join("tasks");
        fs::create_dir_all(&tasks).unwrap();
        let path = tasks.join("T-003.md");
        fs::write(&path, doc).unwrap();
        (root, path)
    }

    #[test]
    fn test_bare_heading_gets_defaults() {
        let (_root, path) = write_task("# T-003: Fix login bug\n");
        let task = parse_task(&path).unwrap();

        assert_eq!(task.id, "T-003");
        assert_eq!(task.title, "Fix login bug");
        assert_eq!(task.project, "alpha");
        assert_eq!(task.owner, "Unassigned");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::P2);
        assert!(task.acceptance_criteria.is_empty());
        assert!(task.goal.is_none());
        assert!(task.depends_on.is_none());
    }

    #[test]
    fn test_full_document() {
        let doc = "\
# T-003: Fix login bug

## Goal
Users stay signed in across refreshes.

## Acceptance Criteria
- [ ] Session cookie survives refresh
- [x] Regression test added
- not a checklist line

## Meta
- Owner: ana
- Status: in_progress
- Priority: P0
- Depends On: T-001
- Created: 2025-02-01
- Updated: 2025-02-10
- Outputs: OUT-004, OUT-007
";
        let (_root, path) = write_task(doc);
        let task = parse_task(&path).unwrap();

        assert_eq!(task.goal.as_deref(), Some("Users stay signed in across refreshes."));
        assert_eq!(
            task.acceptance_criteria,
            vec!["Session cookie survives refresh", "Regression test added"]
        );
        assert_eq!(task.owner, "ana");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Priority::P0);
        assert_eq!(task.depends_on.as_deref(), Some("T-001"));
        assert_eq!(task.created.format("%Y-%m-%d").to_string(), "2025-02-01");
        assert_eq!(
            task.outputs,
            Some(vec!["OUT-004".to_string(), "OUT-007".to_string()])
        );
    }

    #[test]
    fn test_malformed_heading_is_skipped() {
        let (_root, path) = write_task("# Fix login bug\n\nNo id in the heading.\n");
        assert!(parse_task(&path).is_none());

        let (_root, path) = write_task("## T-003: Fix login bug\n");
        assert!(parse_task(&path).is_none());
    }

    #[test]
    fn test_unknown_status_falls_back_to_todo() {
        let doc = "# T-004: Tune cache\n\n## Meta\n- Status: doing\n";
        let (_root, path) = write_task(doc);
        assert_eq!(parse_task(&path).unwrap().status, TaskStatus::Todo);
    }

    #[test]
    fn test_same_document_parses_identically() {
        let doc = "\
# T-005: Stable parse

## Meta
- Created: 2025-01-01
- Updated: 2025-01-02
";
        let (_root, path) = write_task(doc);
        let first = parse_task(&path).unwrap();
        let second = parse_task(&path).unwrap();
        assert_eq!(first, second);
    }
}
