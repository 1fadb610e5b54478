// src/records/mod.rs
// The three record kinds the dashboard serves, plus the snapshot bundle
// that one sync produces. Field names serialize camelCase because that is
// the contract the browser UI consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One project, parsed from a `project-<slug>/overview.md` document.
/// `slug` is unique across the collection and is the upsert key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub slug: String,
    pub title: String,
    pub objective: String,
    pub success_metrics: Vec<String>,
    pub status: ProjectStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stakeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub path: String,
}

/// One task, parsed from a `tasks/T-*.md` file. `(project, id)` is unique;
/// two projects may both carry a `T-001`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project: String,
    pub title: String,
    pub owner: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub acceptance_criteria: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
    pub path: String,
}

/// One artifact produced by a task, parsed from the project's `outputs/`
/// tree. `id` is globally unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub id: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    pub title: String,
    pub output_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub path: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Paused => write!(f, "paused"),
            ProjectStatus::Completed => write!(f, "completed"),
            ProjectStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "paused" | "on_hold" | "on-hold" => Ok(ProjectStatus::Paused),
            "completed" | "complete" | "done" => Ok(ProjectStatus::Completed),
            "archived" => Ok(ProjectStatus::Archived),
            _ => Err(format!("Unknown project status: {s}")),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            _ => Err(format!("Unknown task status: {s}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P0" => Ok(Priority::P0),
            "P1" => Ok(Priority::P1),
            "P2" => Ok(Priority::P2),
            "P3" => Ok(Priority::P3),
            _ => Err(format!("Unknown priority: {s}")),
        }
    }
}

/// One fully-parsed, mutually consistent bundle of records captured at a
/// single sync instant. Never mutated; each sync supersedes the previous
/// snapshot wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub outputs: Vec<Output>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        projects: Vec<Project>,
        tasks: Vec<Task>,
        outputs: Vec<Output>,
        last_sync: Option<String>,
    ) -> Self {
        Self {
            projects,
            tasks,
            outputs,
            last_sync,
            captured_at: Utc::now(),
        }
    }

    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            projects: self.projects.len(),
            tasks: self.tasks.len(),
            outputs: self.outputs.len(),
        }
    }
}

/// How many records of each kind a sync published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub projects: usize,
    pub tasks: usize,
    pub outputs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Review,
            TaskStatus::Done,
            TaskStatus::Blocked,
        ] {
            let parsed: TaskStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_values_are_errors() {
        assert!("urgent".parse::<Priority>().is_err());
        assert!("doing".parse::<TaskStatus>().is_err());
        assert!("stalled".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task {
            id: "T-001".into(),
            project: "alpha".into(),
            title: "Wire up login".into(),
            owner: "Unassigned".into(),
            status: TaskStatus::InProgress,
            priority: Priority::P1,
            depends_on: None,
            created: Utc::now(),
            updated: Utc::now(),
            goal: None,
            acceptance_criteria: vec![],
            outputs: None,
            path: "project-alpha/tasks/T-001.md".into(),
        };

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["priority"], "P1");
        assert!(json.get("acceptanceCriteria").is_some());
        assert!(json.get("dependsOn").is_none());
    }
}
