// src/store/tasks.rs
// Task collection. The upsert key is (project, id): two projects may both
// carry a T-001 and stay distinct.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::records::{Priority, Task, TaskStatus};

/// Whitelisted exact-match predicates for task queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project: Option<String>,
    pub status: Option<String>,
    pub owner: Option<String>,
    pub priority: Option<String>,
    pub id: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.project
            .as_deref()
            .is_none_or(|v| task.project == v)
            && self
                .status
                .as_deref()
                .is_none_or(|v| task.status.to_string() == v)
            && self.owner.as_deref().is_none_or(|v| task.owner == v)
            && self
                .priority
                .as_deref()
                .is_none_or(|v| task.priority.to_string() == v)
            && self.id.as_deref().is_none_or(|v| task.id == v)
    }
}

const UPSERT: &str = r#"
INSERT INTO tasks
    (project, id, title, owner, status, priority, depends_on,
     created, updated, goal, acceptance_criteria, outputs, path)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(project, id) DO UPDATE SET
    title = excluded.title,
    owner = excluded.owner,
    status = excluded.status,
    priority = excluded.priority,
    depends_on = excluded.depends_on,
    created = excluded.created,
    updated = excluded.updated,
    goal = excluded.goal,
    acceptance_criteria = excluded.acceptance_criteria,
    outputs = excluded.outputs,
    path = excluded.path
"#;

const SELECT: &str = "SELECT project, id, title, owner, status, priority, depends_on, \
     created, updated, goal, acceptance_criteria, outputs, path FROM tasks";

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-replace by (project, id).
    pub async fn store(&self, task: &Task) -> Result<()> {
        upsert_query(task)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store task {}/{}", task.project, task.id))?;
        Ok(())
    }

    /// Point lookup within one project's id namespace.
    pub async fn get(&self, id: &str, project: &str) -> Result<Option<Task>> {
        let row = sqlx::query(&format!("{SELECT} WHERE project = ? AND id = ?"))
            .bind(project)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch task")?;
        Ok(row.as_ref().map(row_to_task))
    }

    /// All tasks matching the filter, most recently updated first.
    pub async fn get_all(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("{SELECT} WHERE 1 = 1"));
        if let Some(project) = &filter.project {
            query.push(" AND project = ").push_bind(project.as_str());
        }
        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(owner) = &filter.owner {
            query.push(" AND owner = ").push_bind(owner.as_str());
        }
        if let Some(priority) = &filter.priority {
            query.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(id) = &filter.id {
            query.push(" AND id = ").push_bind(id.as_str());
        }
        query.push(" ORDER BY updated DESC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tasks")?;
        Ok(rows.iter().map(row_to_task).collect())
    }

    pub async fn delete(&self, id: &str, project: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE project = ? AND id = ?")
            .bind(project)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete task")?;
        Ok(result.rows_affected() > 0)
    }

    /// Upsert a whole scan's worth of tasks in one transaction.
    pub async fn store_batch(&self, tasks: &[Task]) -> Result<usize> {
        if tasks.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.context("Failed to begin task batch")?;
        for task in tasks {
            upsert_query(task)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to store task {}/{}", task.project, task.id))?;
        }
        tx.commit().await.context("Failed to commit task batch")?;
        Ok(tasks.len())
    }
}

fn upsert_query(task: &Task) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    let outputs_json = task
        .outputs
        .as_ref()
        .map(|outputs| serde_json::to_string(outputs).unwrap_or_else(|_| "[]".into()));
    sqlx::query(UPSERT)
        .bind(&task.project)
        .bind(&task.id)
        .bind(&task.title)
        .bind(&task.owner)
        .bind(task.status.to_string())
        .bind(task.priority.to_string())
        .bind(&task.depends_on)
        .bind(task.created.timestamp())
        .bind(task.updated.timestamp())
        .bind(&task.goal)
        .bind(serde_json::to_string(&task.acceptance_criteria).unwrap_or_else(|_| "[]".into()))
        .bind(outputs_json)
        .bind(&task.path)
}

fn row_to_task(row: &SqliteRow) -> Task {
    let criteria_json: String = row.get("acceptance_criteria");
    let outputs_json: Option<String> = row.get("outputs");
    Task {
        project: row.get("project"),
        id: row.get("id"),
        title: row.get("title"),
        owner: row.get("owner"),
        status: row
            .get::<String, _>("status")
            .parse()
            .unwrap_or(TaskStatus::Todo),
        priority: row
            .get::<String, _>("priority")
            .parse()
            .unwrap_or(Priority::P2),
        depends_on: row.get("depends_on"),
        created: DateTime::from_timestamp(row.get("created"), 0).unwrap_or_else(Utc::now),
        updated: DateTime::from_timestamp(row.get("updated"), 0).unwrap_or_else(Utc::now),
        goal: row.get("goal"),
        acceptance_criteria: serde_json::from_str(&criteria_json).unwrap_or_default(),
        outputs: outputs_json.and_then(|json| serde_json::from_str(&json).ok()),
        path: row.get("path"),
    }
}
