// src/store/outputs.rs
// Output collection, keyed by the globally-unique output id.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::records::Output;

/// Whitelisted exact-match predicates for output queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputFilter {
    pub project: Option<String>,
    pub task: Option<String>,
    pub id: Option<String>,
}

impl OutputFilter {
    pub fn matches(&self, output: &Output) -> bool {
        self.project
            .as_deref()
            .is_none_or(|v| output.project == v)
            && self
                .task
                .as_deref()
                .is_none_or(|v| output.task.as_deref() == Some(v))
            && self.id.as_deref().is_none_or(|v| output.id == v)
    }
}

const UPSERT: &str = r#"
INSERT INTO outputs
    (id, project, task, title, output_type, content, path, last_modified)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
    project = excluded.project,
    task = excluded.task,
    title = excluded.title,
    output_type = excluded.output_type,
    content = excluded.content,
    path = excluded.path,
    last_modified = excluded.last_modified
"#;

const SELECT: &str =
    "SELECT id, project, task, title, output_type, content, path, last_modified FROM outputs";

#[derive(Clone)]
pub struct OutputStore {
    pool: SqlitePool,
}

impl OutputStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-replace by id.
    pub async fn store(&self, output: &Output) -> Result<()> {
        upsert_query(output)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store output {}", output.id))?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Output>> {
        let row = sqlx::query(&format!("{SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch output")?;
        Ok(row.as_ref().map(row_to_output))
    }

    /// All outputs matching the filter, most recently modified first.
    pub async fn get_all(&self, filter: &OutputFilter) -> Result<Vec<Output>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("{SELECT} WHERE 1 = 1"));
        if let Some(project) = &filter.project {
            query.push(" AND project = ").push_bind(project.as_str());
        }
        if let Some(task) = &filter.task {
            query.push(" AND task = ").push_bind(task.as_str());
        }
        if let Some(id) = &filter.id {
            query.push(" AND id = ").push_bind(id.as_str());
        }
        query.push(" ORDER BY last_modified DESC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list outputs")?;
        Ok(rows.iter().map(row_to_output).collect())
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM outputs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete output")?;
        Ok(result.rows_affected() > 0)
    }

    /// Upsert a whole scan's worth of outputs in one transaction.
    pub async fn store_batch(&self, outputs: &[Output]) -> Result<usize> {
        if outputs.is_empty() {
            return Ok(0);
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin output batch")?;
        for output in outputs {
            upsert_query(output)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to store output {}", output.id))?;
        }
        tx.commit().await.context("Failed to commit output batch")?;
        Ok(outputs.len())
    }
}

fn upsert_query(
    output: &Output,
) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(UPSERT)
        .bind(&output.id)
        .bind(&output.project)
        .bind(&output.task)
        .bind(&output.title)
        .bind(&output.output_type)
        .bind(&output.content)
        .bind(&output.path)
        .bind(output.last_modified.timestamp())
}

fn row_to_output(row: &SqliteRow) -> Output {
    Output {
        id: row.get("id"),
        project: row.get("project"),
        task: row.get("task"),
        title: row.get("title"),
        output_type: row.get("output_type"),
        content: row.get("content"),
        path: row.get("path"),
        last_modified: DateTime::from_timestamp(row.get("last_modified"), 0)
            .unwrap_or_else(Utc::now),
    }
}
